pub mod http_calendar_mirror;
