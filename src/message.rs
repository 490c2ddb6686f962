/// One message read off the event stream: its type tag and raw data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

impl Frame {
    pub fn new(event: &str, data: &str) -> Self {
        Self {
            event: event.to_string(),
            data: data.to_string(),
        }
    }
}

impl From<eventsource_client::Event> for Frame {
    fn from(event: eventsource_client::Event) -> Self {
        Self {
            event: event.event_type,
            data: event.data,
        }
    }
}
