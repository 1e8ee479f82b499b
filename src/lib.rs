//! Translation catalogues are key part of any localization infrastructure. They contain the lists
//! of messages from the application, grouped into named contexts, and corresponding
//! translations.
//!
//! This library handles catalogues in the [Qt Linguist TS][TS] format, an XML format with one
//! catalogue per target language. Each `<context>` usually corresponds to one dialog or window
//! class and each `<message>` binds a source string to its translation, together with the places
//! in the user interface definitions where the string is used and the state of the translation.
//!
//! A catalogue is read once with [`Catalog::load`] (or [`Catalog::open`]) and is immutable
//! afterwards, so it can be shared freely between threads. Lookups never fail: a missing
//! translation is simply `None` and the application should display the source string instead.
//!
//! ```
//! use linguist_catalog::Catalog;
//!
//! let catalog: Catalog = r#"<?xml version="1.0" encoding="utf-8"?>
//! <!DOCTYPE TS>
//! <TS version="2.1" language="ru_RU">
//! <context>
//!     <name>About</name>
//!     <message>
//!         <location filename="about.ui" line="64"/>
//!         <source>Version %1</source>
//!         <translation>Версия %1</translation>
//!     </message>
//! </context>
//! </TS>"#.parse().unwrap();
//!
//! assert_eq!(catalog.lookup("About", "Version %1"), Some("Версия %1"));
//! assert_eq!(catalog.lookup("About", "Quit"), None);
//! assert!(catalog.is_complete("About"));
//! ```
//!
//! [TS]: https://doc.qt.io/qt-6/linguist-ts-file-format.html

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate log;

use locale_config::LanguageRange;

// Auxiliary macro for match checking and then not holding on to the value:
macro_rules! is {
    ($x:expr => $p:pat) => {{
        match $x {
            $p => true,
            _ => false,
        }
    }};
}

pub mod catalog;
pub mod locale;
pub mod ts;

pub use catalog::{Catalog, Context, LookupOptions, Stats};
pub use locale::find_resource;

/// Translated text, possibly with numerus (plural) forms.
///
/// Which forms exist and in what order depends on the target language; the catalogue only stores
/// them in document order.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Text {
    /// Unset text, used for untranslated entries.
    Empty,
    /// Text independent of any count.
    Singular(String),
    /// Count-dependent text, one entry per numerus form of the target language.
    Plural(Vec<String>),
}

impl Text {
    pub fn is_empty(&self) -> bool {
        is!(self => Text::Empty)
    }

    pub fn is_singular(&self) -> bool {
        is!(self => Text::Singular(_))
    }

    pub fn is_plural(&self) -> bool {
        is!(self => Text::Plural(_))
    }

    /// Whether the text has nothing to show: unset, an empty string or all forms empty.
    pub fn is_blank(&self) -> bool {
        match self {
            Text::Empty => true,
            Text::Singular(s) => s.is_empty(),
            Text::Plural(v) => v.iter().all(String::is_empty),
        }
    }

    pub fn singular(&self) -> Option<&str> {
        match self {
            Text::Singular(s) => Some(s),
            _ => None,
        }
    }

    /// The text to display when no count is known: the singular text or the first form.
    pub fn first(&self) -> Option<&str> {
        match self {
            Text::Empty => None,
            Text::Singular(s) => Some(s),
            Text::Plural(v) => v.first().map(String::as_str),
        }
    }

    pub fn forms(&self) -> Option<&[String]> {
        match self {
            Text::Plural(v) => Some(v),
            _ => None,
        }
    }
}

impl Default for Text {
    fn default() -> Text {
        Text::Empty
    }
}

/// Note (comment) origins.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Origin {
    /// Comment from developer (`<extracomment>`).
    Developer,
    /// Comment from translator (`<translatorcomment>`).
    Translator,
}

/// Translation status.
///
/// Stored in the `type` attribute of `<translation>`; a translation without the attribute is
/// finished.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum Status {
    /// The message is in use and translated.
    Finished,
    /// The message is in use but the translation is missing or needs review.
    Unfinished,
    /// The source string is gone from the user interface. Kept for reuse.
    Obsolete,
    /// Like obsolete, but the message was never finished before the source disappeared.
    Vanished,
}

impl Status {
    /// Values accepted in the `type` attribute.
    pub const ATTRIBUTE_VALUES: &'static [&'static str] = &["unfinished", "obsolete", "vanished"];

    /// Parse the `type` attribute; `None` for an unknown value.
    pub fn from_attribute(value: Option<&str>) -> Option<Status> {
        match value {
            None => Some(Status::Finished),
            Some("unfinished") => Some(Status::Unfinished),
            Some("obsolete") => Some(Status::Obsolete),
            Some("vanished") => Some(Status::Vanished),
            Some(_) => None,
        }
    }

    /// The `type` attribute value, `None` for finished messages.
    pub fn attribute(self) -> Option<&'static str> {
        match self {
            Status::Finished => None,
            Status::Unfinished => Some("unfinished"),
            Status::Obsolete => Some("obsolete"),
            Status::Vanished => Some("vanished"),
        }
    }

    /// Returns whether the source string no longer exists in the user interface.
    pub fn is_retired(self) -> bool {
        is!(self => Status::Obsolete | Status::Vanished)
    }
}

impl Default for Status {
    fn default() -> Status {
        Status::Unfinished
    }
}

/// Place in the user interface definitions where a source string is used.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Location {
    _file: String,
    _line: Option<u32>,
}

impl Location {
    pub fn new<S: Into<String>>(file: S, line: Option<u32>) -> Location {
        Location {
            _file: file.into(),
            _line: line,
        }
    }
    /// Get the file name, relative to the catalogue. Empty if the document never named one.
    pub fn file(&self) -> &str { &self._file }
    /// Get the absolute line number.
    pub fn line(&self) -> Option<u32> { self._line }
}

/// Elementary unit of translation.
///
/// A message contains:
///
/// - One *source* string, the original text. Together with the context name it is the lookup key.
/// - The *translation*, possibly empty.
/// - A status. This indicates whether the message is usable in the software.
///
/// Additionally, it can also contain:
///  - A disambiguating comment, for identical source strings with different meanings.
///  - Notes, from developer or translator.
///  - Locations back into the user interface definitions where the message is used.
///  - Previous source and comment, if the source text changed since it was translated.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Message {
    _id: Option<String>,
    _source: String,
    _old_source: Option<String>,
    _comment: Option<String>,
    _old_comment: Option<String>,
    _translation: Text,
    _notes: Vec<(Origin, String)>,
    _locations: Vec<Location>,
    _status: Status,
    _numerus: bool,
}

impl Message {
    /// Create a finished, singular message.
    pub fn new<S: Into<String>, T: Into<String>>(source: S, translation: T) -> Message {
        let translation = translation.into();
        Message {
            _source: source.into(),
            _translation: if translation.is_empty() { Text::Empty } else { Text::Singular(translation) },
            _status: Status::Finished,
            ..Message::default()
        }
    }

    /// Get the message identifier, if the catalogue uses them.
    pub fn id(&self) -> Option<&str> { self._id.as_deref() }
    /// Get the source string.
    pub fn source(&self) -> &str { &self._source }
    /// Get the previous source string.
    pub fn old_source(&self) -> Option<&str> { self._old_source.as_deref() }
    /// Get the disambiguating comment.
    pub fn comment(&self) -> Option<&str> { self._comment.as_deref() }
    /// Get the previous disambiguating comment.
    pub fn old_comment(&self) -> Option<&str> { self._old_comment.as_deref() }
    /// Get the translation.
    pub fn translation(&self) -> &Text { &self._translation }
    /// Get the notes/comments.
    pub fn notes(&self) -> &[(Origin, String)] { &self._notes }
    /// Get locations.
    pub fn locations(&self) -> &[Location] { &self._locations }
    /// Get the status.
    pub fn status(&self) -> Status { self._status }
    /// Returns whether the message has numerus forms.
    pub fn is_numerus(&self) -> bool { self._numerus }
    /// Returns whether the message is finished and has something to show.
    pub fn is_translated(&self) -> bool {
        self._status == Status::Finished && !self._translation.is_blank()
    }

    pub fn with_status(mut self, status: Status) -> Message {
        self._status = status;
        if status.is_retired() {
            self._locations.clear();
        }
        self
    }

    pub fn with_location(mut self, location: Location) -> Message {
        if !self._status.is_retired() {
            self._locations.push(location);
        }
        self
    }

    pub fn with_old_source<S: Into<String>>(mut self, old_source: S) -> Message {
        self._old_source = Some(old_source.into());
        self
    }

    pub fn with_comment<S: Into<String>>(mut self, comment: S) -> Message {
        self._comment = Some(comment.into());
        self
    }

    pub fn with_note<S: Into<String>>(mut self, origin: Origin, note: S) -> Message {
        self._notes.push((origin, note.into()));
        self
    }

    pub fn with_forms(mut self, forms: Vec<String>) -> Message {
        self._numerus = true;
        self._translation = Text::Plural(forms);
        self
    }
}

/// Catalogue reader.
///
/// Defines common interface of catalogue readers. Read the messages, each with the name of its
/// context, by simply iterating over the reader. The other methods are for the important
/// metadata.
pub trait CatalogueReader: Iterator<Item = Result<(String, Message), Error>> {
    /// The target language as a normalized language range.
    fn target_language(&self) -> &LanguageRange<'static>;
    /// The target language tag as written in the catalogue.
    fn language(&self) -> &str;
    /// The language of the source strings, if declared.
    fn source_language(&self) -> Option<&str> { None }
    /// The format version, if declared.
    fn version(&self) -> Option<&str> { None }
}

/// Error in reading or writing a catalogue.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error from file operation.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The document is not well-formed XML.
    ///
    /// Parameters are line number and the error from the XML parser.
    #[error("Malformed XML at line {0}: {1}")]
    Xml(usize, #[source] quick_xml::Error),
    /// A parse error.
    ///
    /// Parameters are line number, optional unexpected token and an array of expected tokens.
    /// Unset unexpected token means the parser is not smart enough to remember what it stopped on.
    /// Empty array of expected items means the parser is not smart enough to remember what it
    /// could have accepted instead.
    #[error("Parse error at line {}{}", .0, describe_parse(.1, .2))]
    Parse(usize, Option<String>, Vec<&'static str>),
}

impl Error {
    /// The line the error was detected at, 0 if not applicable.
    pub fn line(&self) -> usize {
        match self {
            Error::Io(_) => 0,
            Error::Xml(line, _) | Error::Parse(line, ..) => *line,
        }
    }
}

fn describe_parse(got: &Option<String>, exp: &[&'static str]) -> String {
    let mut res = String::new();
    let mut prefix = ", expected";
    for e in exp {
        res.push_str(&format!("{} ‘{}’", prefix, e));
        prefix = " or";
    }
    if let Some(g) = got {
        res.push_str(&format!(", got ‘{}’", g));
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_attribute() {
        assert_eq!(Status::from_attribute(None), Some(Status::Finished));
        assert_eq!(Status::from_attribute(Some("vanished")), Some(Status::Vanished));
        assert_eq!(Status::from_attribute(Some("finished")), None);
        for s in &[Status::Finished, Status::Unfinished, Status::Obsolete, Status::Vanished] {
            assert_eq!(Status::from_attribute(s.attribute()), Some(*s));
        }
    }

    #[test]
    fn blank_text() {
        assert!(Text::Empty.is_blank());
        assert!(Text::Singular(String::new()).is_blank());
        assert!(Text::Plural(vec![String::new(), String::new()]).is_blank());
        assert!(!Text::Plural(vec![String::new(), "x".into()]).is_blank());
        assert_eq!(Text::Plural(vec!["a".into(), "b".into()]).first(), Some("a"));
    }

    #[test]
    fn retired_message_has_no_locations() {
        let m = Message::new("OK", "OK")
            .with_location(Location::new("dialog.ui", Some(3)))
            .with_status(Status::Vanished)
            .with_location(Location::new("dialog.ui", Some(4)));
        assert!(m.locations().is_empty());
        assert!(!m.is_translated());
    }

    #[test]
    fn parse_error_display() {
        let e = Error::Parse(7, Some("<foo>".into()), vec!["source", "translation"]);
        assert_eq!(e.to_string(),
                   "Parse error at line 7, expected ‘source’ or ‘translation’, got ‘<foo>’");
        assert_eq!(e.line(), 7);
        assert_eq!(Error::Parse(2, None, vec![]).to_string(), "Parse error at line 2");
    }
}
