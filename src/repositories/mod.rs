pub mod recipient_source;
