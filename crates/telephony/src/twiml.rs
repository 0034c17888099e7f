use std::fmt::Write as _;

pub const CONTENT_TYPE: &str = "application/xml";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Say {
    pub text: String,
    pub language: Option<String>,
}

/// `<Gather>` collecting speech and posting the result to `action`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gather {
    pub input: String,
    pub action: String,
    pub timeout_secs: u8,
    pub language: Option<String>,
    pub hints: Vec<String>,
    pub prompts: Vec<Say>,
}

impl Gather {
    pub fn speech(action: impl Into<String>, timeout_secs: u8) -> Self {
        Self {
            input: "speech".to_string(),
            action: action.into(),
            timeout_secs,
            language: None,
            hints: Vec::new(),
            prompts: Vec::new(),
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints = hints.into_iter().map(Into::into).collect();
        self
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        let language = self.language.clone();
        self.prompts.push(Say { text: text.into(), language });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verb {
    Say(Say),
    Gather(Gather),
    Redirect(String),
    Hangup,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>, language: Option<&str>) -> Self {
        self.verbs.push(Verb::Say(Say { text: text.into(), language: language.map(str::to_string) }));
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

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
        for verb in &self.verbs {
            write_verb(&mut out, verb);
        }
        out.push_str("</Response>");
        out
    }
}

fn write_verb(out: &mut String, verb: &Verb) {
    match verb {
        Verb::Say(say) => write_say(out, say),
        Verb::Gather(gather) => {
            let _ = write!(
                out,
                r#"<Gather input="{}" action="{}" timeout="{}""#,
                escape(&gather.input),
                escape(&gather.action),
                gather.timeout_secs
            );
            if let Some(language) = &gather.language {
                let _ = write!(out, r#" language="{}""#, escape(language));
            }
            if !gather.hints.is_empty() {
                let _ = write!(out, r#" hints="{}""#, escape(&gather.hints.join(", ")));
            }
            out.push('>');
            for say in &gather.prompts {
                write_say(out, say);
            }
            out.push_str("</Gather>");
        }
        Verb::Redirect(url) => {
            let _ = write!(out, "<Redirect>{}</Redirect>", escape(url));
        }
        Verb::Hangup => out.push_str("<Hangup/>"),
    }
}

fn write_say(out: &mut String, say: &Say) {
    match &say.language {
        Some(language) => {
            let _ = write!(out, r#"<Say language="{}">{}</Say>"#, escape(language), escape(&say.text));
        }
        None => {
            let _ = write!(out, "<Say>{}</Say>", escape(&say.text));
        }
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
