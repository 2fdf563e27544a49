//! The inspector: resolution of human-written object paths, labelling of
//! references, and snapshotting of the store for display. Everything here
//! reads the configuration; only the label table is ever written.

use crate::{
    consts::{INTERNAL_CLASS, INTERNAL_PREV, NIL_DISPLAY, REF_NAME_TAG},
    error::PathError,
    machine::Machine,
    store::{Reference, StateKey, Value},
};
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, digit1, hex_digit1},
    combinator::{all_consuming, map, map_res, verify},
    error::VerboseError,
    multi::separated_list1,
    sequence::{pair, preceded},
    IResult,
};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

type PathResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// The two internalised state keys reachable from object paths.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InternalKey {
    Class,
    Prev,
}

impl InternalKey {
    fn state_key(self) -> StateKey {
        match self {
            Self::Class => StateKey::Class,
            Self::Prev => StateKey::Prev,
        }
    }
}

/// One segment of an object path.
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    /// An ordinary variable name, resolved relative to the running reference
    Var(String),
    /// An internalised key of the running reference, e.g. `internal:class`
    Internal(InternalKey),
    /// An absolute lookup in the label table, e.g. `label:foo`
    Label(String),
    /// An absolute reference id, e.g. `reference:0x2a`
    Reference(usize),
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "{}", name),
            Self::Internal(InternalKey::Class) => {
                write!(f, "{}", INTERNAL_CLASS)
            }
            Self::Internal(InternalKey::Prev) => {
                write!(f, "{}", INTERNAL_PREV)
            }
            Self::Label(name) => write!(f, "label:{}", name),
            Self::Reference(id) => write!(f, "ref:0x{:x}", id),
        }
    }
}

/// A parsed object path: a dot-joined list of segments. The empty path (`.`
/// or the empty string) names the current frame.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ObjectPath {
    segments: Vec<Segment>,
}

impl ObjectPath {
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "." {
            return Ok(Self::default());
        }
        // A leading period means "start at the current frame", which is
        // where resolution starts anyway
        let stripped = trimmed.strip_prefix('.').unwrap_or(trimmed);
        match all_consuming(separated_list1(char('.'), segment))(stripped) {
            Ok((_, segments)) => Ok(Self { segments }),
            Err(_) => Err(PathError::Malformed(trimmed.to_string())),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

// ===== Path grammar =====

fn segment(input: &str) -> PathResult<'_, Segment> {
    alt((
        map(
            preceded(
                pair(
                    alt((
                        tag_no_case("internal"),
                        tag_no_case("int"),
                        tag_no_case("i"),
                    )),
                    char(':'),
                ),
                internal_value,
            ),
            Segment::Internal,
        ),
        map(
            preceded(
                pair(alt((tag_no_case("label"), tag_no_case("l"))), char(':')),
                word,
            ),
            Segment::Label,
        ),
        map(
            preceded(
                pair(
                    alt((
                        tag_no_case("reference"),
                        tag_no_case("ref"),
                        tag_no_case("r"),
                    )),
                    char(':'),
                ),
                reference_value,
            ),
            Segment::Reference,
        ),
        map(word, Segment::Var),
    ))(input)
}

fn internal_value(input: &str) -> PathResult<'_, InternalKey> {
    alt((
        map(
            alt((
                tag_no_case("class"),
                tag_no_case("cls"),
                tag_no_case("c"),
            )),
            |_| InternalKey::Class,
        ),
        map(
            alt((
                tag_no_case("previous"),
                tag_no_case("prev"),
                tag_no_case("p"),
            )),
            |_| InternalKey::Prev,
        ),
    ))(input)
}

/// A reference id: `0x...` hex, or decimal.
fn reference_value(input: &str) -> PathResult<'_, usize> {
    alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1), |s: &str| {
            usize::from_str_radix(s, 16)
        }),
        map_res(digit1, |s: &str| s.parse::<usize>()),
    ))(input)
}

/// An identifier-shaped word: a letter followed by letters and digits.
fn word(input: &str) -> PathResult<'_, String> {
    map(
        verify(
            take_while1(|c: char| c.is_alphanumeric()),
            |s: &str| s.chars().next().map_or(false, char::is_alphabetic),
        ),
        str::to_string,
    )(input)
}

/// A snapshot of one object, ready for display. State values are the names
/// of the pointee references (a label if one exists, else `ref:0x...`), or
/// `NIL` for nil and dangling pointees.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InspectedObject {
    pub name: String,
    pub state: Vec<(String, String)>,
    pub behaviour: Vec<(String, Vec<String>)>,
}

fn key_display(key: &StateKey) -> String {
    match key {
        StateKey::Var(name) => name.clone(),
        StateKey::Prev => INTERNAL_PREV.to_string(),
        StateKey::Class => INTERNAL_CLASS.to_string(),
    }
}

impl Machine {
    /// Resolve an object path, starting at the current frame.
    pub fn resolve(&self, path: &str) -> Result<Value, PathError> {
        let parsed = ObjectPath::parse(path)?;
        self.resolve_path(&parsed)
    }

    fn resolve_path(&self, path: &ObjectPath) -> Result<Value, PathError> {
        let mut current: Value = Some(self.frame_pointer());
        for segment in path.segments() {
            current = self.resolve_segment(current, segment)?;
        }
        Ok(current)
    }

    /// Resolve one segment against the running reference. `label:` and
    /// `reference:` segments replace the running reference outright; the
    /// other forms read through it.
    fn resolve_segment(
        &self,
        current: Value,
        segment: &Segment,
    ) -> Result<Value, PathError> {
        let fail = || PathError::UnresolvedSegment(segment.to_string());
        match segment {
            Segment::Label(name) => {
                let reference = self
                    .label_table()
                    .get(name)
                    .ok_or_else(|| PathError::UnknownLabel(name.clone()))?;
                Ok(Some(*reference))
            }
            Segment::Reference(id) => Ok(Some(Reference::from_id(*id))),
            Segment::Internal(key) => {
                let reference = current.ok_or_else(fail)?;
                let obj = self.store().get(reference).map_err(|_| fail())?;
                obj.get(&key.state_key()).ok_or_else(fail)
            }
            Segment::Var(name) => {
                let reference = current.ok_or_else(fail)?;
                let obj = self.store().get(reference).map_err(|_| fail())?;
                let slot = obj.get_var(name).ok_or_else(fail)?;
                match slot {
                    None => Ok(None),
                    // Frames and containers hold variables behind one level
                    // of indirection; ordinary objects hold them directly.
                    // Read through the indirection when the pointee carries
                    // the same key, otherwise the pointee is the value.
                    Some(container_ref) => {
                        match self.store().get(container_ref) {
                            Ok(container) => {
                                match container.get_var(name) {
                                    Some(value) => Ok(value),
                                    None => Ok(Some(container_ref)),
                                }
                            }
                            // Dangling after a sweep; renders as NIL
                            Err(_) => Ok(Some(container_ref)),
                        }
                    }
                }
            }
        }
    }

    /// Assign a label to the object an object path resolves to. The label
    /// can be used to refer to the object later even if its path changed,
    /// and becomes the object's preferred name in [Machine::inspect] output.
    pub fn label(&mut self, path: &str, name: &str) -> Result<(), PathError> {
        if all_consuming(word)(name.trim()).is_err() {
            return Err(PathError::Malformed(name.trim().to_string()));
        }
        let reference = self
            .resolve(path)?
            .ok_or_else(|| {
                PathError::UnresolvedSegment(path.trim().to_string())
            })?;
        self.label_table_mut()
            .insert(name.trim().to_string(), reference);
        Ok(())
    }

    /// Remove a label by name; or, if the argument is not a known label,
    /// resolve it as an object path and remove every label naming that
    /// reference. Invalid input is silently ignored.
    pub fn unlabel(&mut self, name_or_path: &str) {
        let trimmed = name_or_path.trim();
        if self.label_table_mut().remove(trimmed).is_some() {
            return;
        }
        if let Ok(Some(reference)) = self.resolve(trimmed) {
            self.label_table_mut()
                .retain(|_, labelled| *labelled != reference);
        }
    }

    /// The currently assigned label names, sorted.
    pub fn labels(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.label_table().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot the object subgraph reachable from an object path: the
    /// object itself, plus everything reachable over state edges within
    /// `depth` hops (depth 0 is just the start object).
    pub fn inspect(
        &self,
        path: &str,
        depth: usize,
    ) -> Result<Vec<InspectedObject>, PathError> {
        let parsed = ObjectPath::parse(path)?;
        let start = self
            .resolve_path(&parsed)?
            .filter(|reference| self.store().contains(*reference))
            .ok_or_else(|| {
                PathError::UnresolvedSegment(path.trim().to_string())
            })?;

        let mut collected = vec![start];
        let mut frontier = vec![start];
        for _ in 0..depth {
            let mut next_frontier = Vec::new();
            for reference in frontier {
                for pointee in self.state_edges(reference) {
                    if !collected.contains(&pointee) {
                        collected.push(pointee);
                        next_frontier.push(pointee);
                    }
                }
            }
            frontier = next_frontier;
        }

        Ok(collected
            .into_iter()
            .map(|reference| self.inspect_object(reference))
            .collect())
    }

    /// The stored references an object points to, in sorted key order so
    /// that snapshots are deterministic.
    fn state_edges(&self, reference: Reference) -> Vec<Reference> {
        let obj = self
            .store()
            .get(reference)
            .expect("collected reference vanished");
        let mut entries: Vec<(String, Reference)> = obj
            .state()
            .iter()
            .filter_map(|(key, value)| {
                (*value).map(|pointee| (key_display(key), pointee))
            })
            .filter(|(_, pointee)| self.store().contains(*pointee))
            .collect();
        entries.sort();
        entries.into_iter().map(|(_, pointee)| pointee).collect()
    }

    fn inspect_object(&self, reference: Reference) -> InspectedObject {
        let obj = self
            .store()
            .get(reference)
            .expect("collected reference vanished");

        let mut state: Vec<(String, String)> = obj
            .state()
            .iter()
            .map(|(key, value)| {
                let display = match value {
                    Some(pointee) if self.store().contains(*pointee) => {
                        self.display_name(*pointee)
                    }
                    _ => NIL_DISPLAY.to_string(),
                };
                (key_display(key), display)
            })
            .collect();
        state.sort();

        let mut behaviour: Vec<(String, Vec<String>)> = obj
            .behaviour()
            .iter()
            .map(|(name, method)| (name.clone(), method.params.clone()))
            .collect();
        behaviour.sort();

        InspectedObject {
            name: self.display_name(reference),
            state,
            behaviour,
        }
    }

    /// The preferred display name for a reference: the alphabetically first
    /// label naming it, else a synthetic `ref:0x...` name.
    fn display_name(&self, reference: Reference) -> String {
        let mut names: Vec<&String> = self
            .label_table()
            .iter()
            .filter(|(_, labelled)| **labelled == reference)
            .map(|(name, _)| name)
            .collect();
        names.sort();
        match names.first() {
            Some(name) => (*name).clone(),
            None => format!("{}{}", REF_NAME_TAG, reference),
        }
    }
}
