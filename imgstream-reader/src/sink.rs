//! Consumer-facing event sink

use crate::dispatcher::ConversionResult;
use crossbeam::channel::{self, Receiver, Sender};

/// Receives converted images or errors, always on the consumer context
pub trait ImageStreamSink: Send + Sync {
    fn success(&self, result: ConversionResult);
    fn error(&self, code: &str, message: &str, details: Option<&str>);
}

/// One event delivered to a [`ChannelSink`] receiver
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Image(ConversionResult),
    Error {
        code: String,
        message: String,
        details: Option<String>,
    },
}

/// Sink forwarding every event into a channel
pub struct ChannelSink {
    tx: Sender<StreamEvent>,
}

impl ChannelSink {
    /// Returns the sink and the receiver the consumer reads events from
    pub fn unbounded() -> (Self, Receiver<StreamEvent>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, event: StreamEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("stream event dropped, receiver gone");
        }
    }
}

impl ImageStreamSink for ChannelSink {
    fn success(&self, result: ConversionResult) {
        self.send(StreamEvent::Image(result));
    }

    fn error(&self, code: &str, message: &str, details: Option<&str>) {
        self.send(StreamEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
            details: details.map(str::to_string),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgstream_video::ImageFormat;

    #[test]
    fn test_channel_sink_forwards_events() {
        let (sink, rx) = ChannelSink::unbounded();

        sink.error("BufferAccessFault", "gone", None);
        sink.success(ConversionResult {
            planes: Vec::new(),
            width: 2,
            height: 2,
            format: ImageFormat::Nv21,
            lens_aperture: None,
            sensor_exposure_time: None,
            sensor_sensitivity: None,
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            StreamEvent::Error {
                code: "BufferAccessFault".into(),
                message: "gone".into(),
                details: None,
            }
        );
        assert!(matches!(rx.try_recv().unwrap(), StreamEvent::Image(r) if r.width == 2));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (sink, rx) = ChannelSink::unbounded();
        drop(rx);
        sink.error("InvalidFrame", "ignored", Some("details"));
    }
}
