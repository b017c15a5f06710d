//! Typed call-control markup (TwiML) for every voice response this service emits.
//!
//! Interpolated text (incident addresses, descriptions, queue names) is written
//! through the XML writer, so reporter-supplied strings are always escaped and
//! can never introduce extra verbs into a response.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("failed to write call-control markup: {0}")]
    Write(String),
    #[error("queue name must not be empty")]
    EmptyQueue,
}

/// One instruction inside a `<Response>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Say(String),
    Pause { seconds: u32 },
    Play(String),
    Enqueue(String),
    DialQueue(String),
    Hangup,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn pause(mut self, seconds: u32) -> Self {
        self.verbs.push(Verb::Pause { seconds });
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play(url.into()));
        self
    }

    /// Park the current caller in the named holding queue.
    pub fn enqueue(mut self, queue: impl Into<String>) -> Self {
        self.verbs.push(Verb::Enqueue(queue.into()));
        self
    }

    /// Dial into a holding queue, joining whoever is parked there.
    pub fn dial_queue(mut self, queue: impl Into<String>) -> Self {
        self.verbs.push(Verb::DialQueue(queue.into()));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    /// Serialize to an XML document.
    pub fn render(&self) -> Result<String, MarkupError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        emit(&mut writer, Event::Start(BytesStart::new("Response")))?;

        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => text_element(&mut writer, "Say", text)?,
                Verb::Pause { seconds } => {
                    let length = seconds.to_string();
                    emit(
                        &mut writer,
                        Event::Empty(
                            BytesStart::new("Pause").with_attributes([("length", length.as_str())]),
                        ),
                    )?;
                }
                Verb::Play(url) => text_element(&mut writer, "Play", url)?,
                Verb::Enqueue(queue) => {
                    ensure_queue(queue)?;
                    text_element(&mut writer, "Enqueue", queue)?;
                }
                Verb::DialQueue(queue) => {
                    ensure_queue(queue)?;
                    emit(&mut writer, Event::Start(BytesStart::new("Dial")))?;
                    text_element(&mut writer, "Queue", queue)?;
                    emit(&mut writer, Event::End(BytesEnd::new("Dial")))?;
                }
                Verb::Hangup => {
                    emit(&mut writer, Event::Empty(BytesStart::new("Hangup")))?;
                }
            }
        }

        emit(&mut writer, Event::End(BytesEnd::new("Response")))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| MarkupError::Write(e.to_string()))
    }
}

fn ensure_queue(queue: &str) -> Result<(), MarkupError> {
    if queue.trim().is_empty() {
        return Err(MarkupError::EmptyQueue);
    }
    Ok(())
}

fn text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> Result<(), MarkupError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn emit(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), MarkupError> {
    writer
        .write_event(event)
        .map_err(|e| MarkupError::Write(e.to_string()))
}
