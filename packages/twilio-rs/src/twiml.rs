//! TwiML voice response documents

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::TwilioError;

/// Conference events Twilio should report to `statusCallback`
const CONFERENCE_EVENTS: &str = "start end join leave";

/// `<Gather>` collecting DTMF input, with an optional spoken prompt nested inside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gather {
    pub num_digits: u8,
    pub timeout_secs: u32,
    pub action: String,
    pub prompt: Option<String>,
}

/// `<Dial><Conference>` bridging the current leg into a named room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conference {
    pub room: String,
    pub participant_label: Option<String>,
    pub start_conference_on_enter: bool,
    pub end_conference_on_exit: bool,
    pub status_callback: String,
    pub wait_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verb {
    Say(String),
    Gather(Gather),
    Redirect(String),
    Conference(Conference),
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

    pub fn gather(mut self, gather: Gather) -> Self {
        self.verbs.push(Verb::Gather(gather));
        self
    }

    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Redirect(url.into()));
        self
    }

    pub fn conference(mut self, conference: Conference) -> Self {
        self.verbs.push(Verb::Conference(conference));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Render the document as TwiML
    pub fn to_xml(&self) -> Result<String, TwilioError> {
        let mut writer = Writer::new(Vec::new());

        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        emit(&mut writer, Event::Start(BytesStart::new("Response")))?;

        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => text_element(&mut writer, BytesStart::new("Say"), text)?,
                Verb::Redirect(url) => {
                    let mut redirect = BytesStart::new("Redirect");
                    redirect.push_attribute(("method", "POST"));
                    text_element(&mut writer, redirect, url)?;
                }
                Verb::Gather(gather) => write_gather(&mut writer, gather)?,
                Verb::Conference(conference) => write_conference(&mut writer, conference)?,
                Verb::Hangup => emit(&mut writer, Event::Empty(BytesStart::new("Hangup")))?,
            }
        }

        emit(&mut writer, Event::End(BytesEnd::new("Response")))?;

        String::from_utf8(writer.into_inner()).map_err(|e| TwilioError::Twiml(e.to_string()))
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), TwilioError> {
    writer
        .write_event(event)
        .map_err(|e| TwilioError::Twiml(e.to_string()))
}

fn text_element(
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'_>,
    text: &str,
) -> Result<(), TwilioError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    emit(writer, Event::Start(start))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn write_gather(writer: &mut Writer<Vec<u8>>, gather: &Gather) -> Result<(), TwilioError> {
    let num_digits = gather.num_digits.to_string();
    let timeout = gather.timeout_secs.to_string();

    let mut start = BytesStart::new("Gather");
    start.push_attribute(("numDigits", num_digits.as_str()));
    start.push_attribute(("timeout", timeout.as_str()));
    start.push_attribute(("action", gather.action.as_str()));
    start.push_attribute(("method", "POST"));

    emit(writer, Event::Start(start))?;
    if let Some(prompt) = &gather.prompt {
        text_element(writer, BytesStart::new("Say"), prompt)?;
    }
    emit(writer, Event::End(BytesEnd::new("Gather")))
}

fn write_conference(
    writer: &mut Writer<Vec<u8>>,
    conference: &Conference,
) -> Result<(), TwilioError> {
    emit(writer, Event::Start(BytesStart::new("Dial")))?;

    let mut start = BytesStart::new("Conference");
    if let Some(label) = &conference.participant_label {
        start.push_attribute(("participantLabel", label.as_str()));
    }
    start.push_attribute((
        "startConferenceOnEnter",
        bool_attr(conference.start_conference_on_enter),
    ));
    start.push_attribute((
        "endConferenceOnExit",
        bool_attr(conference.end_conference_on_exit),
    ));
    start.push_attribute(("statusCallback", conference.status_callback.as_str()));
    start.push_attribute(("statusCallbackEvent", CONFERENCE_EVENTS));
    start.push_attribute(("statusCallbackMethod", "POST"));
    if let Some(wait_url) = &conference.wait_url {
        start.push_attribute(("waitUrl", wait_url.as_str()));
    }
    text_element(writer, start, &conference.room)?;

    emit(writer, Event::End(BytesEnd::new("Dial")))
}

fn bool_attr(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
