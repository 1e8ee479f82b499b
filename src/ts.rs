//! Handling of [Qt Linguist TS][TS] files
//!
//! This format is used by the Qt `lupdate`/`linguist`/`lrelease` tools. It is an XML format
//! storing translation messages grouped in named contexts, each with the locations in the user
//! interface definitions, the translation and its status.
//!
//! Locations may be written relative to the previous location (`line="+16"`, no `filename`); the
//! reader resolves them so that the model only ever holds absolute lines, and the writer always
//! produces absolute ones.
//!
//! [TS]: https://doc.qt.io/qt-6/linguist-ts-file-format.html

use locale_config::LanguageRange;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use std::collections::HashMap;
use std::io::{self, Write};
use super::{Catalog, CatalogueReader, Error, Location, Message, Origin, Status, Text};

/// Format version written when the catalogue does not have one.
pub const DEFAULT_VERSION: &str = "2.1";

lazy_static!{
    static ref LINE_RE: Regex = Regex::new(r"^\s*([+-]?)\s*(\d+)\s*$").unwrap();
    static ref BYTE_RE: Regex = Regex::new(r"^(?:[xX]([0-9A-Fa-f]+)|(\d+))$").unwrap();
}

// Simple text elements of a message, in the order they are written.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Field {
    Source,
    OldSource,
    Comment,
    OldComment,
    ExtraComment,
    TranslatorComment,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Field> {
        match tag {
            b"source" => Some(Field::Source),
            b"oldsource" => Some(Field::OldSource),
            b"comment" => Some(Field::Comment),
            b"oldcomment" => Some(Field::OldComment),
            b"extracomment" => Some(Field::ExtraComment),
            b"translatorcomment" => Some(Field::TranslatorComment),
            _ => None,
        }
    }
}

/// Normalize a language tag as written in TS files (`ru_RU`) to a language range (`ru-RU`).
pub fn language_range(tag: &str) -> LanguageRange<'static> {
    LanguageRange::new(tag)
        .map(LanguageRange::into_static)
        .or_else(|_| LanguageRange::from_unix(tag))
        .unwrap_or_else(|_| LanguageRange::invariant())
}

fn tag<'e>(e: &'e BytesStart) -> &'e [u8] {
    e.name().into_inner()
}

fn describe(ev: &Event) -> String {
    match ev {
        Event::Start(e) => format!("<{}>", String::from_utf8_lossy(tag(e))),
        Event::Empty(e) => format!("<{}/>", String::from_utf8_lossy(tag(e))),
        Event::End(e) => format!("</{}>", String::from_utf8_lossy(e.name().into_inner())),
        Event::Text(_) | Event::CData(_) => "text".to_owned(),
        Event::Eof => "end of file".to_owned(),
        _ => "markup".to_owned(),
    }
}

// Resolves locations relative to the previous one. The current file is inherited by locations
// without a file name and lines prefixed with a sign are offsets from the last line seen in the
// same file.
#[derive(Debug, Default)]
struct LocationTracker {
    _file: String,
    _lines: HashMap<String, i64>,
}

impl LocationTracker {
    fn resolve(&mut self, file: Option<String>, line: Option<&str>) -> Result<Location, ()> {
        if let Some(f) = file {
            self._file = f;
        }
        let line = match line {
            None => None,
            Some(l) => {
                let c = LINE_RE.captures(l).ok_or(())?;
                let n: i64 = c[2].parse().map_err(|_| ())?;
                let last = self._lines.get(&self._file).cloned().unwrap_or(0);
                let abs = match &c[1] {
                    "+" => last.checked_add(n),
                    "-" => last.checked_sub(n),
                    _ => Some(n),
                };
                let abs = abs.and_then(|l| u32::try_from(l).ok()).ok_or(())?;
                self._lines.insert(self._file.clone(), i64::from(abs));
                Some(abs)
            }
        };
        Ok(Location::new(self._file.clone(), line))
    }
}

/// Streaming reader of a TS document.
///
/// The root element is read on construction, so the metadata is available before the first
/// message. Iterating yields `(context name, message)` pairs in document order. The first error
/// ends the iteration.
pub struct TsReader<'a> {
    _input: &'a [u8],
    _xml: Reader<&'a [u8]>,
    _language: String,
    _target_language: LanguageRange<'static>,
    _source_language: Option<String>,
    _version: Option<String>,
    _context: Option<String>,
    _locations: LocationTracker,
    _done: bool,
}

impl<'a> TsReader<'a> {
    pub fn new(input: &'a str) -> Result<TsReader<'a>, Error> {
        let mut res = TsReader {
            _input: input.as_bytes(),
            _xml: Reader::from_str(input),
            _language: String::new(),
            _target_language: LanguageRange::invariant(),
            _source_language: None,
            _version: None,
            _context: None,
            _locations: LocationTracker::default(),
            _done: false,
        };
        match res.next_tag()? {
            Event::Start(ref e) if tag(e) == b"TS" => res.parse_ts_header(e)?,
            Event::Empty(ref e) if tag(e) == b"TS" => {
                res.parse_ts_header(e)?;
                res.expect_eof()?;
                res._done = true;
            }
            ev => return Err(res.unexpected(&ev, vec!["<TS>"])),
        }
        Ok(res)
    }

    /// Get the `sourcelanguage` attribute.
    pub fn source_language(&self) -> Option<&str> {
        self._source_language.as_deref()
    }

    /// Get the format version.
    pub fn version(&self) -> Option<&str> {
        self._version.as_deref()
    }

    fn line_at(&self, pos: usize) -> usize {
        let pos = pos.min(self._input.len());
        self._input[..pos].iter().filter(|&&b| b == b'\n').count() + 1
    }

    fn line(&self) -> usize {
        self.line_at(self._xml.buffer_position() as usize)
    }

    fn xml_error(&self, err: quick_xml::Error) -> Error {
        Error::Xml(self.line_at(self._xml.error_position() as usize), err)
    }

    fn unexpected(&self, ev: &Event, exp: Vec<&'static str>) -> Error {
        Error::Parse(self.line(), Some(describe(ev)), exp)
    }

    fn read(&mut self) -> Result<Event<'a>, Error> {
        match self._xml.read_event() {
            Ok(ev) => Ok(ev),
            Err(err) => Err(self.xml_error(err)),
        }
    }

    // Next event that matters for the structure: skips comments, processing instructions, the
    // declaration, the doctype and whitespace between elements.
    fn next_tag(&mut self) -> Result<Event<'a>, Error> {
        loop {
            match self.read()? {
                Event::Text(ref t) if t.iter().all(u8::is_ascii_whitespace) => (),
                Event::Comment(_) | Event::Decl(_) | Event::DocType(_) | Event::PI(_) => (),
                ev => return Ok(ev),
            }
        }
    }

    fn expect_eof(&mut self) -> Result<(), Error> {
        match self.next_tag()? {
            Event::Eof => Ok(()),
            ev => Err(self.unexpected(&ev, vec!["end of file"])),
        }
    }

    fn attribute(&self, e: &BytesStart, name: &[u8]) -> Result<Option<String>, Error> {
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.xml_error(err.into()))?;
            if attr.key.as_ref() == name {
                let value = attr.unescape_value().map_err(|err| self.xml_error(err.into()))?;
                return Ok(Some(value.into_owned()));
            }
        }
        Ok(None)
    }

    fn parse_ts_header(&mut self, e: &BytesStart) -> Result<(), Error> {
        self._version = self.attribute(e, b"version")?;
        self._source_language = self.attribute(e, b"sourcelanguage")?;
        if let Some(lang) = self.attribute(e, b"language")? {
            self._target_language = language_range(&lang);
            self._language = lang;
        }
        debug!("reading TS {} catalogue for ‘{}’",
               self._version.as_deref().unwrap_or(DEFAULT_VERSION), self._language);
        Ok(())
    }

    // Reads character data up to the end tag, decoding entities, CDATA and `<byte/>` escapes.
    fn read_text(&mut self, end: &[u8]) -> Result<String, Error> {
        let mut text = String::new();
        loop {
            match self.read()? {
                Event::Text(t) => {
                    let s = t.unescape().map_err(|err| self.xml_error(err.into()))?;
                    text.push_str(&s);
                }
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
                Event::Empty(ref e) if tag(e) == b"byte" => {
                    let c = self.parse_byte(e)?;
                    text.push(c);
                }
                Event::Comment(_) => (),
                Event::End(ref e) if e.name().into_inner() == end => return Ok(text),
                ev => return Err(self.unexpected(&ev, vec!["text"])),
            }
        }
    }

    fn parse_byte(&self, e: &BytesStart) -> Result<char, Error> {
        let value = self.attribute(e, b"value")?.unwrap_or_default();
        let code = BYTE_RE.captures(&value).and_then(|c| match (c.get(1), c.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        });
        code.and_then(::std::char::from_u32)
            .ok_or_else(|| Error::Parse(self.line(), Some(value), vec!["character code"]))
    }

    fn parse_location(&mut self, e: &BytesStart) -> Result<Location, Error> {
        let file = self.attribute(e, b"filename")?;
        let line = self.attribute(e, b"line")?;
        match self._locations.resolve(file, line.as_deref()) {
            Ok(loc) => Ok(loc),
            Err(()) => Err(Error::Parse(self.line(), line, vec!["line number"])),
        }
    }

    fn parse_status(&self, e: &BytesStart) -> Result<Status, Error> {
        let value = self.attribute(e, b"type")?;
        Status::from_attribute(value.as_deref())
            .ok_or_else(|| Error::Parse(self.line(), value.clone(), Status::ATTRIBUTE_VALUES.to_vec()))
    }

    fn parse_translation(&mut self, numerus: bool) -> Result<Text, Error> {
        if !numerus {
            let s = self.read_text(b"translation")?;
            return Ok(if s.is_empty() { Text::Empty } else { Text::Singular(s) });
        }
        let mut forms = Vec::new();
        loop {
            match self.next_tag()? {
                Event::Start(ref e) if tag(e) == b"numerusform" => {
                    forms.push(self.read_text(b"numerusform")?);
                }
                Event::Empty(ref e) if tag(e) == b"numerusform" => forms.push(String::new()),
                Event::End(ref e) if e.name().into_inner() == b"translation" => break,
                ev => return Err(self.unexpected(&ev, vec!["<numerusform>", "</translation>"])),
            }
        }
        Ok(if forms.is_empty() { Text::Empty } else { Text::Plural(forms) })
    }

    fn parse_context_name(&mut self) -> Result<String, Error> {
        match self.next_tag()? {
            Event::Start(ref e) if tag(e) == b"name" => self.read_text(b"name"),
            Event::Empty(ref e) if tag(e) == b"name" => Ok(String::new()),
            ev => Err(self.unexpected(&ev, vec!["<name>"])),
        }
    }

    fn parse_message(&mut self, start: &BytesStart) -> Result<Message, Error> {
        let mut message = Message::default();
        message._id = self.attribute(start, b"id")?;
        message._numerus = self.attribute(start, b"numerus")?.as_deref() == Some("yes");

        let mut source = None;
        let mut translation = None;
        let mut locations = Vec::new();
        loop {
            let ev = self.next_tag()?;
            let (e, empty) = match ev {
                Event::Start(ref e) => (e, false),
                Event::Empty(ref e) => (e, true),
                Event::End(ref e) if e.name().into_inner() == b"message" => break,
                ev => return Err(self.unexpected(&ev, vec!["<source>", "</message>"])),
            };
            match tag(e) {
                b"location" => {
                    locations.push(self.parse_location(e)?);
                    if !empty {
                        self.read_text(b"location")?;
                    }
                }
                b"translation" => {
                    let status = self.parse_status(e)?;
                    let text = if empty {
                        Text::Empty
                    } else {
                        self.parse_translation(message._numerus)?
                    };
                    translation = Some((status, text));
                }
                t => {
                    let field = match Field::from_tag(t) {
                        Some(f) => f,
                        None => return Err(self.unexpected(&ev, vec!["<source>", "<translation>"])),
                    };
                    let value = if empty { String::new() } else { self.read_text(t)? };
                    match field {
                        Field::Source => source = Some(value),
                        Field::OldSource => message._old_source = Some(value),
                        Field::Comment => message._comment = Some(value),
                        Field::OldComment => message._old_comment = Some(value),
                        Field::ExtraComment => message._notes.push((Origin::Developer, value)),
                        Field::TranslatorComment => message._notes.push((Origin::Translator, value)),
                    }
                }
            }
        }

        message._source = match source {
            Some(s) => s,
            None => return Err(Error::Parse(self.line(), Some("</message>".to_owned()),
                                            vec!["<source>"])),
        };
        let (status, text) = translation.unwrap_or((Status::Unfinished, Text::Empty));
        message._status = status;
        message._translation = text;
        if status.is_retired() && !locations.is_empty() {
            warn!("dropping {} location(s) of retired message ‘{}’ at line {}",
                  locations.len(), message._source, self.line());
        } else {
            message._locations = locations;
        }
        Ok(message)
    }

    fn next_message(&mut self) -> Result<Option<(String, Message)>, Error> {
        loop {
            let ev = self.next_tag()?;
            if self._context.is_none() {
                match ev {
                    Event::Start(ref e) if tag(e) == b"context" => {
                        let name = self.parse_context_name()?;
                        trace!("reading context ‘{}’", name);
                        self._context = Some(name);
                    }
                    Event::End(ref e) if e.name().into_inner() == b"TS" => {
                        self.expect_eof()?;
                        return Ok(None);
                    }
                    ev => return Err(self.unexpected(&ev, vec!["<context>", "</TS>"])),
                }
            } else {
                match ev {
                    Event::Start(ref e) if tag(e) == b"message" => {
                        let message = self.parse_message(e)?;
                        let context = self._context.clone().unwrap_or_default();
                        return Ok(Some((context, message)));
                    }
                    Event::End(ref e) if e.name().into_inner() == b"context" => {
                        self._context = None;
                    }
                    ev => return Err(self.unexpected(&ev, vec!["<message>", "</context>"])),
                }
            }
        }
    }
}

impl<'a> Iterator for TsReader<'a> {
    type Item = Result<(String, Message), Error>;
    fn next(&mut self) -> Option<Result<(String, Message), Error>> {
        if self._done {
            return None;
        }
        match self.next_message() {
            Ok(Some(m)) => Some(Ok(m)),
            Ok(None) => {
                self._done = true;
                None
            }
            Err(e) => {
                self._done = true;
                Some(Err(e))
            }
        }
    }
}

impl<'a> CatalogueReader for TsReader<'a> {
    fn target_language(&self) -> &LanguageRange<'static> {
        &self._target_language
    }

    fn language(&self) -> &str {
        &self._language
    }

    fn source_language(&self) -> Option<&str> {
        TsReader::source_language(self)
    }

    fn version(&self) -> Option<&str> {
        TsReader::version(self)
    }
}

// Control characters are not allowed in XML 1.0, so they go out as `<byte value="xN"/>`.
fn is_byte_escaped(c: char) -> bool {
    c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')
}

// Writes element content. Every run, even an empty one, is a text event, so no indentation ends
// up inside the element.
fn write_content<W: Write>(xml: &mut Writer<W>, text: &str) -> io::Result<()> {
    let mut rest = text;
    while let Some(pos) = rest.find(is_byte_escaped) {
        xml.write_event(Event::Text(BytesText::new(&rest[..pos])))?;
        let c = rest[pos..].chars().next().unwrap_or_default();
        let mut byte = BytesStart::new("byte");
        byte.push_attribute(("value", format!("x{:x}", u32::from(c)).as_str()));
        xml.write_event(Event::Empty(byte))?;
        rest = &rest[pos + c.len_utf8()..];
    }
    xml.write_event(Event::Text(BytesText::new(rest)))
}

fn write_text<W: Write>(xml: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    xml.write_event(Event::Start(BytesStart::new(name)))?;
    write_content(xml, text)?;
    xml.write_event(Event::End(BytesEnd::new(name)))
}

fn write_message<W: Write>(xml: &mut Writer<W>, message: &Message) -> io::Result<()> {
    let mut start = BytesStart::new("message");
    if let Some(id) = message.id() {
        start.push_attribute(("id", id));
    }
    if message.is_numerus() {
        start.push_attribute(("numerus", "yes"));
    }
    xml.write_event(Event::Start(start))?;

    for loc in message.locations() {
        let mut e = BytesStart::new("location");
        e.push_attribute(("filename", loc.file()));
        if let Some(line) = loc.line() {
            e.push_attribute(("line", line.to_string().as_str()));
        }
        xml.write_event(Event::Empty(e))?;
    }
    write_text(xml, "source", message.source())?;
    if let Some(s) = message.old_source() {
        write_text(xml, "oldsource", s)?;
    }
    if let Some(s) = message.comment() {
        write_text(xml, "comment", s)?;
    }
    if let Some(s) = message.old_comment() {
        write_text(xml, "oldcomment", s)?;
    }
    for (origin, note) in message.notes() {
        match origin {
            Origin::Developer => write_text(xml, "extracomment", note)?,
            Origin::Translator => write_text(xml, "translatorcomment", note)?,
        }
    }

    let mut translation = BytesStart::new("translation");
    if let Some(t) = message.status().attribute() {
        translation.push_attribute(("type", t));
    }
    match message.translation() {
        Text::Plural(forms) => {
            xml.write_event(Event::Start(translation))?;
            for form in forms {
                write_text(xml, "numerusform", form)?;
            }
            xml.write_event(Event::End(BytesEnd::new("translation")))?;
        }
        text => {
            xml.write_event(Event::Start(translation))?;
            write_content(xml, text.first().unwrap_or(""))?;
            xml.write_event(Event::End(BytesEnd::new("translation")))?;
        }
    }

    xml.write_event(Event::End(BytesEnd::new("message")))
}

/// Write the catalogue as a TS document.
///
/// The output is UTF-8, indented by four spaces, with all locations absolute.
pub fn write_catalog<W: Write>(writer: W, catalog: &Catalog) -> io::Result<()> {
    let mut xml = Writer::new_with_indent(writer, b' ', 4);
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    xml.write_event(Event::DocType(BytesText::from_escaped("TS")))?;

    let mut ts = BytesStart::new("TS");
    ts.push_attribute(("version", catalog.version().unwrap_or(DEFAULT_VERSION)));
    ts.push_attribute(("language", catalog.language()));
    if let Some(lang) = catalog.source_language() {
        ts.push_attribute(("sourcelanguage", lang));
    }
    xml.write_event(Event::Start(ts))?;
    for context in catalog.contexts() {
        xml.write_event(Event::Start(BytesStart::new("context")))?;
        write_text(&mut xml, "name", context.name())?;
        for message in context.messages() {
            write_message(&mut xml, message)?;
        }
        xml.write_event(Event::End(BytesEnd::new("context")))?;
    }
    xml.write_event(Event::End(BytesEnd::new("TS")))?;
    xml.get_mut().write_all(b"\n")
}
