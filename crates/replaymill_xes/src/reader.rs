//! Streaming XES reader.
//!
//! Walks the XML as a flat sequence of start/end tags and never materializes a
//! document tree: memory is bounded by one trace's attribute map plus the event
//! currently being assembled. Each closed `<event>` is emitted as one
//! [`EventRecord`] tagged with its owning case id.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use crate::record::EventRecord;
use crate::value::AttrValue;
use crate::{Result, XesError};

/// Canonical output field names.
pub const EVENT_ID_FIELD: &str = "event_id";
pub const CASE_ID_FIELD: &str = "case_id";
pub const ACTIVITY_FIELD: &str = "activity";
pub const TIMESTAMP_FIELD: &str = "ts";

/// XES key that names a trace (case id) or an event (activity).
const CONCEPT_NAME_KEY: &str = "concept:name";
/// Explicit per-event sequence index, when the exporter supplies one.
const INDEX_KEY: &str = "@@index";

/// Reader position in the document. `<event>` outside a trace, `<trace>`
/// outside the log and similar violations are structural errors, not
/// silently absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    BeforeLog,
    InLog,
    InTrace,
    InEvent,
    Done,
}

/// How event ids are numbered within one trace. Decided by the first event
/// and never re-derived: mixing explicit indexes with the fallback counter
/// inside a single trace would break id stability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexScheme {
    Explicit,
    Counter,
}

/// Per-trace parse context. Replaced wholesale when a new trace opens, so
/// nothing leaks across traces.
#[derive(Debug, Default)]
struct TraceScope {
    attrs: EventRecord,
    case_id: Option<String>,
    scheme: Option<IndexScheme>,
    next_position: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrKind {
    String,
    Int,
    Float,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Log,
    Trace,
    Event,
    Attr(AttrKind),
    Other,
}

impl Tag {
    fn classify(local_name: &[u8]) -> Tag {
        match local_name {
            b"log" => Tag::Log,
            b"trace" => Tag::Trace,
            b"event" => Tag::Event,
            b"string" => Tag::Attr(AttrKind::String),
            b"int" => Tag::Attr(AttrKind::Int),
            b"float" => Tag::Attr(AttrKind::Float),
            b"date" => Tag::Attr(AttrKind::Date),
            _ => Tag::Other,
        }
    }
}

/// Lazy, finite iterator of flattened event records for one XES source.
pub struct XesReader<R: BufRead> {
    reader: Reader<R>,
    source_name: String,
    state: ReaderState,
    trace: TraceScope,
    event_fields: EventRecord,
    buf: Vec<u8>,
    skip_buf: Vec<u8>,
}

impl XesReader<BufReader<File>> {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| XesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

impl<R: BufRead> XesReader<R> {
    pub fn from_reader(inner: R, source_name: impl Into<String>) -> Self {
        let mut reader = Reader::from_reader(inner);
        // Empty elements arrive as Start+End pairs, so `<string .../>` and
        // `<string>...</string>` take the same code path.
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            source_name: source_name.into(),
            state: ReaderState::BeforeLog,
            trace: TraceScope::default(),
            event_fields: EventRecord::new(),
            buf: Vec::new(),
            skip_buf: Vec::new(),
        }
    }

    fn structure_error(&self, message: impl Into<String>) -> XesError {
        XesError::Structure {
            source_name: self.source_name.clone(),
            position: self.reader.buffer_position(),
            message: message.into(),
        }
    }

    fn xml_error(&self, source: quick_xml::Error) -> XesError {
        XesError::Xml {
            source_name: self.source_name.clone(),
            position: self.reader.buffer_position(),
            source,
        }
    }

    fn handle_open(&mut self, tag: Tag, key: Option<String>, value: Option<String>) -> Result<()> {
        match tag {
            Tag::Log => {
                if self.state != ReaderState::BeforeLog {
                    return Err(self.structure_error("unexpected nested <log>"));
                }
                self.state = ReaderState::InLog;
            }
            Tag::Trace => {
                if self.state != ReaderState::InLog {
                    return Err(self.structure_error("<trace> outside <log>"));
                }
                self.trace = TraceScope::default();
                self.state = ReaderState::InTrace;
            }
            Tag::Event => {
                if self.state != ReaderState::InTrace {
                    return Err(self.structure_error("<event> outside <trace>"));
                }
                self.event_fields = EventRecord::new();
                self.state = ReaderState::InEvent;
            }
            Tag::Attr(kind) => match self.state {
                ReaderState::InTrace => self.record_trace_attr(kind, key, value),
                ReaderState::InEvent => self.record_event_attr(kind, key, value),
                // Log-level attributes are outside the supported subset.
                _ => {}
            },
            Tag::Other => {}
        }
        Ok(())
    }

    fn record_trace_attr(&mut self, kind: AttrKind, key: Option<String>, value: Option<String>) {
        let Some(key) = key else {
            warn!(source = %self.source_name, "trace attribute without key, skipped");
            return;
        };
        match kind {
            AttrKind::String => {
                if key == CONCEPT_NAME_KEY {
                    self.trace.case_id = value.clone();
                }
                self.trace.attrs.insert(key, to_str_value(value));
            }
            AttrKind::Int => {
                let parsed = self.parse_number(&key, value, |s| {
                    s.parse::<i64>().ok().map(AttrValue::Int)
                });
                self.trace.attrs.insert(key, parsed);
            }
            AttrKind::Float => {
                let parsed = self.parse_number(&key, value, |s| {
                    s.parse::<f64>().ok().map(AttrValue::Float)
                });
                self.trace.attrs.insert(key, parsed);
            }
            // Trace-level dates are outside the supported subset.
            AttrKind::Date => {}
        }
    }

    fn record_event_attr(&mut self, kind: AttrKind, key: Option<String>, value: Option<String>) {
        let Some(key) = key else {
            warn!(source = %self.source_name, "event attribute without key, skipped");
            return;
        };
        match kind {
            AttrKind::String => {
                if key == CONCEPT_NAME_KEY {
                    // The canonical activity name gets its own column.
                    self.event_fields
                        .insert(ACTIVITY_FIELD, to_str_value(value));
                } else {
                    self.event_fields.insert(key, to_str_value(value));
                }
            }
            AttrKind::Int => {
                let parsed = self.parse_number(&key, value, |s| {
                    s.parse::<i64>().ok().map(AttrValue::Int)
                });
                self.event_fields.insert(key, parsed);
            }
            AttrKind::Float => {
                let parsed = self.parse_number(&key, value, |s| {
                    s.parse::<f64>().ok().map(AttrValue::Float)
                });
                self.event_fields.insert(key, parsed);
            }
            AttrKind::Date => {
                // Kept raw here; the normalizer coerces it to a datetime.
                self.event_fields.insert(TIMESTAMP_FIELD, to_str_value(value));
            }
        }
    }

    fn parse_number(
        &self,
        key: &str,
        value: Option<String>,
        parse: impl Fn(&str) -> Option<AttrValue>,
    ) -> AttrValue {
        match value {
            Some(raw) => match parse(raw.trim()) {
                Some(parsed) => parsed,
                None => {
                    warn!(
                        source = %self.source_name,
                        key, raw, "non-numeric value in numeric attribute, nulled"
                    );
                    AttrValue::Missing
                }
            },
            None => AttrValue::Missing,
        }
    }

    /// Assemble the finished event: synthesize the id, seed case context and
    /// merge trace attributes without overwriting event-level values.
    fn finish_event(&mut self) -> EventRecord {
        let fields = std::mem::take(&mut self.event_fields);

        let explicit_index = fields.get(INDEX_KEY).cloned();
        let scheme = *self.trace.scheme.get_or_insert(if explicit_index.is_some() {
            IndexScheme::Explicit
        } else {
            IndexScheme::Counter
        });
        let position = self.trace.next_position;
        self.trace.next_position += 1;

        let index = match (scheme, &explicit_index) {
            (IndexScheme::Explicit, Some(value)) if !value.is_missing() => value.as_id_segment(),
            (IndexScheme::Explicit, _) => {
                warn!(
                    source = %self.source_name,
                    case = self.trace.case_id.as_deref().unwrap_or(""),
                    position,
                    "event missing explicit index in an explicitly indexed trace"
                );
                position.to_string()
            }
            (IndexScheme::Counter, _) => position.to_string(),
        };

        let case_segment = self.trace.case_id.clone().unwrap_or_default();
        let mut record = EventRecord::new();
        record.insert(
            EVENT_ID_FIELD,
            AttrValue::Str(format!("{case_segment}-{index}")),
        );
        record.insert(
            CASE_ID_FIELD,
            match &self.trace.case_id {
                Some(id) => AttrValue::Str(id.clone()),
                None => AttrValue::Missing,
            },
        );
        for (key, value) in fields.iter() {
            record.insert_if_absent(key, value.clone());
        }
        for (key, value) in self.trace.attrs.iter() {
            record.insert_if_absent(key, value.clone());
        }
        record
    }

    fn handle_close(&mut self, tag: Tag) -> Result<Option<EventRecord>> {
        match tag {
            Tag::Event => {
                if self.state != ReaderState::InEvent {
                    return Err(self.structure_error("unexpected </event>"));
                }
                self.state = ReaderState::InTrace;
                Ok(Some(self.finish_event()))
            }
            Tag::Trace => {
                if self.state != ReaderState::InTrace {
                    return Err(self.structure_error("unexpected </trace>"));
                }
                // Release the trace scope; its memory does not outlive it.
                self.trace = TraceScope::default();
                self.state = ReaderState::InLog;
                Ok(None)
            }
            Tag::Log => {
                if self.state != ReaderState::InLog {
                    return Err(self.structure_error("unexpected </log>"));
                }
                self.state = ReaderState::Done;
                Ok(None)
            }
            // Attribute and unknown subtrees are consumed with read_to_end,
            // so their end tags never surface here.
            Tag::Attr(_) | Tag::Other => Ok(None),
        }
    }
}

impl<R: BufRead> Iterator for XesReader<R> {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ReaderState::Done {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Err(err) => {
                    self.state = ReaderState::Done;
                    return Some(Err(self.xml_error(err)));
                }
                Ok(Event::Eof) => {
                    let state = self.state;
                    self.state = ReaderState::Done;
                    return match state {
                        ReaderState::BeforeLog => {
                            Some(Err(self.structure_error("no <log> element found")))
                        }
                        ReaderState::Done => None,
                        _ => Some(Err(
                            self.structure_error("unexpected end of file inside <log>")
                        )),
                    };
                }
                Ok(Event::Start(e)) => {
                    let tag = Tag::classify(e.local_name().as_ref());
                    let key_value = match tag {
                        Tag::Attr(_) => Some(parse_key_value(&e)),
                        _ => None,
                    };
                    // Attribute and unknown elements are skipped as whole
                    // subtrees; nested XES lists are out of scope.
                    let skip = match tag {
                        Tag::Attr(_) | Tag::Other => Some(e.to_end().into_owned()),
                        _ => None,
                    };

                    let (key, value) = match key_value {
                        Some(Ok(kv)) => kv,
                        Some(Err(message)) => {
                            self.state = ReaderState::Done;
                            return Some(Err(self.structure_error(message)));
                        }
                        None => (None, None),
                    };

                    if let Err(err) = self.handle_open(tag, key, value) {
                        self.state = ReaderState::Done;
                        return Some(Err(err));
                    }

                    if let Some(end) = skip {
                        self.skip_buf.clear();
                        if let Err(err) = self
                            .reader
                            .read_to_end_into(end.name(), &mut self.skip_buf)
                        {
                            self.state = ReaderState::Done;
                            return Some(Err(self.xml_error(err)));
                        }
                    }
                }
                Ok(Event::End(e)) => {
                    let tag = Tag::classify(e.local_name().as_ref());
                    match self.handle_close(tag) {
                        Err(err) => {
                            self.state = ReaderState::Done;
                            return Some(Err(err));
                        }
                        Ok(Some(record)) => return Some(Ok(record)),
                        Ok(None) => {}
                    }
                }
                // Text, comments, declarations and PIs carry no event data.
                Ok(_) => {}
            }
        }
    }
}

fn to_str_value(value: Option<String>) -> AttrValue {
    match value {
        Some(v) => AttrValue::Str(v),
        None => AttrValue::Missing,
    }
}

/// Pull the `key`/`value` XML attributes off an XES attribute element.
fn parse_key_value(
    e: &BytesStart<'_>,
) -> std::result::Result<(Option<String>, Option<String>), String> {
    let mut key = None;
    let mut value = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| format!("bad attribute: {err}"))?;
        match attr.key.local_name().as_ref() {
            b"key" => key = Some(decode_attr(&attr.value)),
            b"value" => value = Some(decode_attr(&attr.value)),
            _ => {}
        }
    }
    Ok((key, value))
}

fn decode_attr(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match quick_xml::escape::unescape(&text) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => text.into_owned(),
    }
}
