//! In-memory catalogue and its queries.
//!
//! A [`Catalog`] is built once from a reader and never changes afterwards. Contexts keep the order
//! of the document; a context name that appears more than once is merged into its first
//! occurrence. Messages keep declaration order, which is the tie-break when the same source string
//! occurs more than once in a context.

use locale_config::{LanguageRange, Locale};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;
use super::{locale, ts, CatalogueReader, Error, Message, Status};

/// Which messages a lookup may answer from.
///
/// Vanished messages are never used. The defaults accept everything else, including unfinished
/// translations that have some text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LookupOptions {
    /// Use unfinished messages that have a translation. Off is what `lrelease -nounfinished` does.
    pub include_unfinished: bool,
    /// Use obsolete messages.
    pub include_obsolete: bool,
}

impl LookupOptions {
    /// Only finished translations.
    pub fn finished_only() -> LookupOptions {
        LookupOptions {
            include_unfinished: false,
            include_obsolete: false,
        }
    }

    pub fn accepts(&self, status: Status) -> bool {
        match status {
            Status::Finished => true,
            Status::Unfinished => self.include_unfinished,
            Status::Obsolete => self.include_obsolete,
            Status::Vanished => false,
        }
    }
}

impl Default for LookupOptions {
    fn default() -> LookupOptions {
        LookupOptions {
            include_unfinished: true,
            include_obsolete: true,
        }
    }
}

/// Number of messages in each status.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub finished: usize,
    pub unfinished: usize,
    pub obsolete: usize,
    pub vanished: usize,
}

impl Stats {
    fn count(&mut self, status: Status) {
        match status {
            Status::Finished => self.finished += 1,
            Status::Unfinished => self.unfinished += 1,
            Status::Obsolete => self.obsolete += 1,
            Status::Vanished => self.vanished += 1,
        }
    }

    fn merge(&mut self, other: Stats) {
        self.finished += other.finished;
        self.unfinished += other.unfinished;
        self.obsolete += other.obsolete;
        self.vanished += other.vanished;
    }

    pub fn total(&self) -> usize {
        self.finished + self.unfinished + self.obsolete + self.vanished
    }

    /// Messages still used by the application.
    pub fn active(&self) -> usize {
        self.finished + self.unfinished
    }
}

/// Named group of messages, usually one dialog or window class.
#[derive(Clone, Debug, PartialEq)]
pub struct Context {
    _name: String,
    _messages: Vec<Message>,
    // source -> positions in _messages, in declaration order
    _index: HashMap<String, Vec<usize>>,
}

impl Context {
    fn new(name: String) -> Context {
        Context {
            _name: name,
            _messages: Vec::new(),
            _index: HashMap::new(),
        }
    }

    fn push(&mut self, message: Message) {
        self._index.entry(message.source().to_owned())
            .or_insert_with(Vec::new)
            .push(self._messages.len());
        self._messages.push(message);
    }

    pub fn name(&self) -> &str { &self._name }

    pub fn messages(&self) -> &[Message] { &self._messages }

    /// All messages with the given source string, in declaration order.
    pub fn find<'a>(&'a self, source: &str) -> impl Iterator<Item = &'a Message> + 'a {
        self._index.get(source)
            .into_iter()
            .flat_map(move |v| v.iter().map(move |&i| &self._messages[i]))
    }

    /// The message a lookup answers from: the first candidate with an acceptable status.
    pub fn resolve(&self, source: &str, disambiguation: Option<&str>, options: &LookupOptions)
        -> Option<&Message>
    {
        self.find(source)
            .filter(|m| disambiguation.map_or(true, |d| m.comment().unwrap_or("") == d))
            .find(|m| options.accepts(m.status()))
    }

    /// Whether every message is finished and translated. An empty context is not complete.
    pub fn is_complete(&self) -> bool {
        !self._messages.is_empty() && self._messages.iter().all(Message::is_translated)
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        for m in &self._messages {
            stats.count(m.status());
        }
        stats
    }
}

/// Translations for one target language.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    _language: String,
    _target_language: LanguageRange<'static>,
    _source_language: Option<String>,
    _version: Option<String>,
    _contexts: Vec<Context>,
    _index: HashMap<String, usize>,
}

impl Catalog {
    /// Collect everything a reader yields. Fails with the first error the reader reports.
    pub fn from_reader<R: CatalogueReader>(reader: R) -> Result<Catalog, Error> {
        let mut catalog = Catalog {
            _language: reader.language().to_owned(),
            _target_language: reader.target_language().clone(),
            _source_language: reader.source_language().map(str::to_owned),
            _version: reader.version().map(str::to_owned),
            _contexts: Vec::new(),
            _index: HashMap::new(),
        };
        for item in reader {
            let (context, message) = item?;
            catalog.push(context, message);
        }
        debug!("loaded ‘{}’ catalogue: {} contexts, {} messages",
               catalog._language, catalog._contexts.len(), catalog.len());
        Ok(catalog)
    }

    /// Build a catalogue from `(context name, message)` pairs, in the same way a reader's output
    /// is collected.
    pub fn from_messages<I>(language: &str, messages: I) -> Catalog
        where I: IntoIterator<Item = (String, Message)>
    {
        let mut catalog = Catalog {
            _language: language.to_owned(),
            _target_language: ts::language_range(language),
            _source_language: None,
            _version: None,
            _contexts: Vec::new(),
            _index: HashMap::new(),
        };
        for (context, message) in messages {
            catalog.push(context, message);
        }
        catalog
    }

    /// Read a TS document.
    ///
    /// Input that is not UTF-8 is a parse error at the line of the first invalid byte.
    pub fn load<R: Read>(mut reader: R) -> Result<Catalog, Error> {
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;
        match String::from_utf8(input) {
            Ok(text) => text.parse(),
            Err(err) => {
                let valid = &err.as_bytes()[..err.utf8_error().valid_up_to()];
                let line = valid.iter().filter(|&&b| b == b'\n').count() + 1;
                Err(Error::Parse(line, None, vec!["UTF-8"]))
            }
        }
    }

    /// Read a TS file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Catalog, Error> {
        debug!("opening catalogue {}", path.as_ref().display());
        Catalog::load(BufReader::new(File::open(path)?))
    }

    /// Load `<prefix>_<lang>.ts` from `dir` for the user's preferred message languages.
    ///
    /// Returns `None` when there is no resource for any of them; the application should then show
    /// the source strings.
    pub fn open_for_user_locale<P: AsRef<Path>>(dir: P, prefix: &str)
        -> Result<Option<Catalog>, Error>
    {
        let user = Locale::user_default();
        match locale::find_resource(dir.as_ref(), prefix, user.tags_for("messages")) {
            Some(path) => Catalog::open(path).map(Some),
            None => Ok(None),
        }
    }

    fn push(&mut self, context: String, message: Message) {
        let n = match self._index.get(&context) {
            Some(&n) => n,
            None => {
                let n = self._contexts.len();
                self._index.insert(context.clone(), n);
                self._contexts.push(Context::new(context));
                n
            }
        };
        self._contexts[n].push(message);
    }

    /// Write as a TS document.
    pub fn write<W: Write>(&self, writer: W) -> Result<(), Error> {
        ts::write_catalog(writer, self)?;
        Ok(())
    }

    /// Write to a TS file, replacing it.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let mut file = BufWriter::new(File::create(path)?);
        self.write(&mut file)?;
        file.flush()?;
        Ok(())
    }

    /// The target language tag as written in the catalogue, e.g. `ru_RU`.
    pub fn language(&self) -> &str { &self._language }

    /// The target language as a language range, e.g. `ru-RU`.
    pub fn target_language(&self) -> &LanguageRange<'static> { &self._target_language }

    pub fn source_language(&self) -> Option<&str> { self._source_language.as_deref() }

    pub fn version(&self) -> Option<&str> { self._version.as_deref() }

    pub fn contexts(&self) -> &[Context] { &self._contexts }

    pub fn context(&self, name: &str) -> Option<&Context> {
        self._index.get(name).map(|&n| &self._contexts[n])
    }

    /// Number of messages in all contexts.
    pub fn len(&self) -> usize {
        self._contexts.iter().map(|c| c.messages().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self._contexts.iter().all(|c| c.messages().is_empty())
    }

    /// Translation of `source` in `context`.
    ///
    /// Answers from the first message in declaration order that is not vanished. If that message
    /// has no translation text the result is `None` and the source string should be shown. For
    /// numerus messages this is the first form.
    pub fn lookup(&self, context: &str, source: &str) -> Option<&str> {
        self.lookup_with(context, source, None, &LookupOptions::default())
    }

    /// Like [`lookup`](#method.lookup), restricted to messages with the given disambiguating
    /// comment and to the statuses `options` accept.
    pub fn lookup_with(&self, context: &str, source: &str, disambiguation: Option<&str>,
                       options: &LookupOptions) -> Option<&str>
    {
        self.context(context)?
            .resolve(source, disambiguation, options)?
            .translation()
            .first()
            .filter(|t| !t.is_empty())
    }

    /// All numerus forms of the translation of `source` in `context`.
    pub fn lookup_forms(&self, context: &str, source: &str) -> Option<&[String]> {
        self.context(context)?
            .resolve(source, None, &LookupOptions::default())?
            .translation()
            .forms()
            .filter(|f| f.iter().any(|s| !s.is_empty()))
    }

    /// Translation of `source` in `context`, or `source` itself when there is none.
    pub fn translate<'a>(&'a self, context: &str, source: &'a str) -> &'a str {
        self.lookup(context, source).unwrap_or(source)
    }

    /// Whether every message of `context` is finished and translated. Unknown contexts are not.
    pub fn is_complete(&self, context: &str) -> bool {
        self.context(context).map_or(false, Context::is_complete)
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        for c in &self._contexts {
            stats.merge(c.stats());
        }
        stats
    }
}

impl FromStr for Catalog {
    type Err = Error;
    fn from_str(s: &str) -> Result<Catalog, Error> {
        Catalog::from_reader(ts::TsReader::new(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUPLICATES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE TS>
<TS version="2.1" language="sv_SE">
<context>
    <name>MainWindow</name>
    <message>
        <source>Cppcheck</source>
        <translation type="vanished">Gammal</translation>
    </message>
    <message>
        <location filename="main.cpp" line="1"/>
        <source>Cppcheck</source>
        <translation>Cppcheck</translation>
    </message>
    <message>
        <location filename="mainwindow.ui" line="7"/>
        <source>Cppcheck</source>
        <translation>Annan</translation>
    </message>
    <message>
        <source>Open</source>
        <comment>verb</comment>
        <translation>Öppna</translation>
    </message>
    <message>
        <source>Open</source>
        <comment>adjective</comment>
        <translation>Öppen</translation>
    </message>
    <message>
        <source>Stop</source>
        <translation type="unfinished">Stoppa</translation>
    </message>
    <message>
        <source>Old</source>
        <translation type="obsolete">Gammal</translation>
    </message>
</context>
<context>
    <name>About</name>
    <message>
        <source>Version %1</source>
        <translation>Version %1</translation>
    </message>
</context>
<context>
    <name>MainWindow</name>
    <message>
        <source>Quit</source>
        <translation>Avsluta</translation>
    </message>
</context>
</TS>
"#;

    #[test]
    fn first_active_duplicate_wins() {
        let catalog: Catalog = DUPLICATES.parse().unwrap();
        assert_eq!(catalog.lookup("MainWindow", "Cppcheck"), Some("Cppcheck"));
        assert_eq!(catalog.context("MainWindow").unwrap().find("Cppcheck").count(), 3);
    }

    #[test]
    fn repeated_context_is_merged() {
        let catalog: Catalog = DUPLICATES.parse().unwrap();
        let names: Vec<_> = catalog.contexts().iter().map(Context::name).collect();
        assert_eq!(names, vec!["MainWindow", "About"]);
        assert_eq!(catalog.lookup("MainWindow", "Quit"), Some("Avsluta"));
        assert_eq!(catalog.context("MainWindow").unwrap().messages().last().unwrap().source(), "Quit");
        assert_eq!(catalog.len(), 9);
    }

    #[test]
    fn disambiguation_and_options() {
        let catalog: Catalog = DUPLICATES.parse().unwrap();
        let all = LookupOptions::default();
        let strict = LookupOptions::finished_only();
        assert_eq!(catalog.lookup("MainWindow", "Open"), Some("Öppna"));
        assert_eq!(catalog.lookup_with("MainWindow", "Open", Some("adjective"), &all), Some("Öppen"));
        assert_eq!(catalog.lookup_with("MainWindow", "Open", Some("noun"), &all), None);
        assert_eq!(catalog.lookup("MainWindow", "Stop"), Some("Stoppa"));
        assert_eq!(catalog.lookup_with("MainWindow", "Stop", None, &strict), None);
        assert_eq!(catalog.lookup("MainWindow", "Old"), Some("Gammal"));
        assert_eq!(catalog.lookup_with("MainWindow", "Old", None, &strict), None);
    }

    #[test]
    fn translate_falls_back_to_source() {
        let catalog: Catalog = DUPLICATES.parse().unwrap();
        assert_eq!(catalog.translate("MainWindow", "Quit"), "Avsluta");
        assert_eq!(catalog.translate("MainWindow", "Help"), "Help");
        assert_eq!(catalog.translate("NoSuchContext", "Quit"), "Quit");
    }

    #[test]
    fn completeness_and_stats() {
        let catalog: Catalog = DUPLICATES.parse().unwrap();
        assert!(catalog.is_complete("About"));
        assert!(!catalog.is_complete("MainWindow"));
        assert!(!catalog.is_complete("NoSuchContext"));
        assert_eq!(catalog.stats(), Stats { finished: 6, unfinished: 1, obsolete: 1, vanished: 1 });
        assert_eq!(catalog.context("About").unwrap().stats().total(), 1);
        assert_eq!(catalog.stats().active(), 7);
    }

    #[test]
    fn numerus_forms() {
        let catalog: Catalog = r#"<TS version="2.1" language="ru">
<context>
    <name>ResultsView</name>
    <message numerus="yes">
        <source>%n error(s)</source>
        <translation>
            <numerusform>%n ошибка</numerusform>
            <numerusform>%n ошибки</numerusform>
            <numerusform>%n ошибок</numerusform>
        </translation>
    </message>
</context>
</TS>"#.parse().unwrap();
        assert_eq!(catalog.lookup("ResultsView", "%n error(s)"), Some("%n ошибка"));
        assert_eq!(catalog.lookup_forms("ResultsView", "%n error(s)").unwrap().len(), 3);
        assert_eq!(catalog.lookup_forms("ResultsView", "%n warning(s)"), None);
    }

    #[test]
    fn built_catalog_survives_writing() {
        use crate::{Location, Origin, Text};

        let catalog = Catalog::from_messages("de_DE", vec![
            ("Dialog".to_owned(), Message::new("Open", "Öffnen")
                .with_location(Location::new("dialog.ui", Some(12)))
                .with_comment("verb")
                .with_note(Origin::Developer, "Toolbar button")),
            ("Dialog".to_owned(), Message::new("Close \"%1\"", "")
                .with_old_source("Close")
                .with_status(Status::Unfinished)),
            ("Results".to_owned(), Message::new("%n file(s)", "")
                .with_forms(vec!["%n Datei".to_owned(), "%n Dateien".to_owned()])),
        ]);
        assert!(AsRef::<str>::as_ref(catalog.target_language()).eq_ignore_ascii_case("de-DE"));
        assert_eq!(catalog.lookup_with("Dialog", "Open", Some("verb"), &LookupOptions::default()),
                   Some("Öffnen"));
        assert_eq!(catalog.lookup("Dialog", "Close \"%1\""), None);

        let mut out = Vec::new();
        catalog.write(&mut out).unwrap();
        let again = Catalog::load(&out[..]).unwrap();
        assert_eq!(again.version(), Some(ts::DEFAULT_VERSION));
        let close = again.context("Dialog").unwrap().find("Close \"%1\"").next().unwrap();
        assert_eq!(close.old_source(), Some("Close"));
        assert!(close.translation().is_empty());
        let open = again.context("Dialog").unwrap().find("Open").next().unwrap();
        assert_eq!(open.notes(), catalog.context("Dialog").unwrap().messages()[0].notes());
        assert_eq!(open.locations(), &[Location::new("dialog.ui", Some(12))][..]);
        assert_eq!(again.context("Results").unwrap().messages()[0].translation(),
                   &Text::Plural(vec!["%n Datei".to_owned(), "%n Dateien".to_owned()]));
    }

    #[test]
    fn catalog_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Catalog>();
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let input = b"<TS language=\"ru\">\n<context><name>A</name>\n<message><source>\xff</source>";
        match Catalog::load(&input[..]) {
            Err(Error::Parse(3, None, ref exp)) => assert_eq!(exp, &vec!["UTF-8"]),
            other => panic!("unexpected result {:?}", other.map(|c| c.len())),
        }
    }
}
