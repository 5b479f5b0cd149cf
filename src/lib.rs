// SPDX-License-Identifier: MIT

//! A parser and evaluator for HID Report Descriptors.
//!
//! A HID Report Descriptor is a compact, tag-based binary document that
//! describes the layout and numeric semantics of the byte-level reports a
//! HID device exchanges with a host. This crate decodes such a descriptor
//! into an ordered set of [Report]s, each an ordered list of [Control]s
//! hanging off a tree of [Collection]s, and can then *evaluate* a report:
//! walk its controls in order and emit one event per field slot, with the
//! bit offset each slot occupies in an eventual report payload.
//!
//! ```
//! # use crate::hideval::*;
//! # fn parse(bytes: &[u8]) {
//! let rdesc = ReportDescriptor::try_from(bytes).unwrap();
//! for report in rdesc.reports() {
//!     println!("Report #{} with {} controls", report.id(), report.controls().len());
//! }
//! # }
//! ```
//!
//! Evaluation goes through the [Evaluator] trait - see
//! [ReportDescriptor::evaluate].
//!
//! In this document and unless stated otherwise, a reference to "Section a.b.c" refers to the
//! [HID Device Class Definition for HID 1.11](https://www.usb.org/document-library/device-class-definition-hid-111).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

pub mod bits;
pub mod hid;
pub mod types;

use hid::{Item, ItemKind};
pub use types::*;

/// Shortcut for the "check condition, return error" pattern.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err);
        }
    };
}

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Unexpected end of descriptor")]
    UnexpectedEof,
    #[error("Invalid data: {message}")]
    InvalidArgument { message: String },
    #[error("Unsupported {kind:?} tag {tag}")]
    UnsupportedTag { kind: ItemKind, tag: u8 },
    #[error("{item} not supported")]
    NotSupported { item: String },
    #[error("No report with ID {id}")]
    NotFound { id: i32 },
    #[error("Pop without a matching Push")]
    StackUnderflow,
    #[error("Access would lead to out-of-bounds")]
    OutOfBounds,
}

type Result<T> = std::result::Result<T, ParserError>;

/// The global item state (Section 6.2.2.7) in effect at one point of the
/// descriptor. Global items describe rather than define data, so every
/// [Control] and [Collection] snapshots this state at creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalState {
    pub usage_page: i32,
    pub logical_minimum: i32,
    pub logical_maximum: i32,
    pub physical_minimum: i32,
    pub physical_maximum: i32,
    pub unit: i32,
    pub unit_exponent: i32,
    pub report_id: i32,
    pub report_size: i32,
    pub report_count: i32,
}

/// A set of integers given either as an explicit ordered list or as an
/// inclusive minimum/maximum pair, but never both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Range {
    values: Option<Vec<i32>>,
    min: Option<i32>,
    max: Option<i32>,
}

impl Range {
    fn set(&mut self, value: i32) {
        self.values = Some(vec![value]);
    }

    fn add(&mut self, value: i32) {
        match self.values.as_mut() {
            Some(values) => values.push(value),
            None => self.set(value),
        }
    }

    fn is_empty(&self) -> bool {
        self.values.is_none() && self.min.is_none() && self.max.is_none()
    }

    pub fn values(&self) -> Option<&[i32]> {
        self.values.as_deref()
    }

    pub fn minimum(&self) -> Option<i32> {
        self.min
    }

    pub fn maximum(&self) -> Option<i32> {
        self.max
    }

    /// Project the `index`th element: in list mode the list entry, clamped
    /// to the last one; in minimum/maximum mode `minimum + index`; `None`
    /// when the range holds nothing at all.
    pub fn for_index(&self, index: usize) -> Option<i32> {
        if let Some(values) = &self.values {
            Some(values[index.min(values.len() - 1)])
        } else if let Some(min) = self.min {
            debug_assert!(self.max.is_some_and(|max| index as i32 <= max - min));
            Some(min + index as i32)
        } else {
            None
        }
    }
}

/// The local item state (Section 6.2.2.8) accumulated for one main item.
/// Local items do not carry over to the next main item; the parser swaps
/// in a fresh `LocalState` after every main item, and the [Control]
/// created by that main item keeps the old one for later projection of
/// per-slot usages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    usage: Range,
    usages: Vec<Range>,
    designator: Range,
    string: Range,
    // When set, the current usage range lives at usages.last() because a
    // Delimiter opened an alternatives group that is not yet closed.
    delimited: bool,
}

impl LocalState {
    fn usage(&self) -> &Range {
        if self.delimited {
            self.usages.last().unwrap()
        } else {
            &self.usage
        }
    }

    fn usage_mut(&mut self) -> &mut Range {
        if self.delimited {
            self.usages.last_mut().unwrap()
        } else {
            &mut self.usage
        }
    }

    fn delimiter(&mut self, item: &Item) -> Result<()> {
        match item.value() {
            1 => {
                ensure!(
                    self.usage().is_empty(),
                    ParserError::InvalidArgument {
                        message: format!("{item} after usage items not allowed"),
                    }
                );
                if !self.delimited {
                    self.usages.push(std::mem::take(&mut self.usage));
                    self.delimited = true;
                }
            }
            0 => {
                self.usage = Range::default();
                self.delimited = false;
            }
            value => {
                return Err(ParserError::InvalidArgument {
                    message: format!("unsupported delimiter value {value}"),
                })
            }
        }
        Ok(())
    }

    /// The designator range of this state, if any.
    pub fn designator(&self) -> &Range {
        &self.designator
    }

    /// The string index range of this state, if any.
    pub fn string(&self) -> &Range {
        &self.string
    }

    /// The usage range of this state when no alternatives groups were
    /// declared, or the completed alternatives when they were.
    pub fn usage_ranges(&self) -> &[Range] {
        if self.usages.is_empty() {
            std::slice::from_ref(&self.usage)
        } else {
            &self.usages
        }
    }

    /// Project the usages that apply to the `index`th slot of a control.
    /// Without Delimiter alternatives this is at most one usage; with
    /// alternatives it is one usage per declared alternative.
    pub fn usages_for_index(&self, index: usize) -> Vec<Usage> {
        if self.usages.is_empty() {
            self.usage
                .for_index(index)
                .map(|u| Usage(u as u32))
                .into_iter()
                .collect()
        } else {
            self.usages
                .iter()
                .filter_map(|range| range.for_index(index))
                .map(|u| Usage(u as u32))
                .collect()
        }
    }
}

/// One node in the collection tree. Collections group controls under a
/// type (Section 6.2.2.6) and a set of usage tags; they nest, with parent
/// links pointing towards the root.
#[derive(Debug, Clone)]
pub struct Collection {
    id: u32,
    kind: CollectionKind,
    parent: Option<usize>,
    usages: Vec<Usage>,
    designator: Option<i32>,
    string: Option<i32>,
    globals: GlobalState,
}

impl Collection {
    /// A process-unique, monotonically increasing identifier, starting at
    /// 1 for the first collection of a descriptor.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// The index of the parent collection in
    /// [ReportDescriptor::collections], `None` for roots.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// The usages attached to this collection.
    pub fn usages(&self) -> &[Usage] {
        &self.usages
    }

    pub fn designator(&self) -> Option<i32> {
        self.designator
    }

    pub fn string(&self) -> Option<i32> {
        self.string
    }

    /// The global item state in effect when this collection was opened.
    pub fn globals(&self) -> &GlobalState {
        &self.globals
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Collection #{} kind={:?} usages=[", self.id, self.kind)?;
        for (i, usage) in self.usages.iter().enumerate() {
            write!(f, "{}{usage}", if i == 0 { "" } else { ", " })?;
        }
        write!(f, "]]")
    }
}

/// One field definition in a report: an input, output or feature main
/// item together with the global and local state it was declared under.
#[derive(Debug, Clone)]
pub struct Control {
    direction: Direction,
    flags: Flags,
    parent: Option<usize>,
    globals: GlobalState,
    locals: LocalState,
}

impl Control {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The nine data flags of the main item, see [Flags].
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// The index of the enclosing collection in
    /// [ReportDescriptor::collections], `None` for a control declared
    /// outside any collection.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// The global item state in effect when this control was declared.
    pub fn globals(&self) -> &GlobalState {
        &self.globals
    }

    /// The local item state accumulated for this control.
    pub fn locals(&self) -> &LocalState {
        &self.locals
    }

    /// The width of one slot of this control, in bits.
    pub fn report_size(&self) -> usize {
        self.globals.report_size as usize
    }

    /// The number of slots of this control.
    pub fn report_count(&self) -> usize {
        self.globals.report_count as usize
    }
}

impl std::fmt::Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[Control {:?} flags={} size={} count={}]",
            self.direction,
            self.flags,
            self.report_size(),
            self.report_count()
        )
    }
}

/// A group of controls that travel together over the wire, identified by
/// an integer report ID (0 when the descriptor never declares one).
#[derive(Debug)]
pub struct Report {
    id: i32,
    directions: BTreeSet<Direction>,
    controls: Vec<Control>,
}

impl Report {
    fn new(id: i32) -> Report {
        Report {
            id,
            directions: BTreeSet::new(),
            controls: Vec::new(),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// The directions of the controls seen in this report.
    pub fn directions(&self) -> &BTreeSet<Direction> {
        &self.directions
    }

    /// The controls of this report, in declaration order across all
    /// directions.
    pub fn controls(&self) -> &[Control] {
        &self.controls
    }
}

/// The callbacks invoked by [ReportDescriptor::evaluate], one per kind of
/// event. `collection` and `control` act as filters: returning `false`
/// suppresses the events below them (the walk still accounts for the
/// skipped control's bits, so later offsets are unaffected).
pub trait Evaluator {
    /// Called once per collection that (transitively) contains an
    /// accepted control of the requested direction, parents before
    /// children. Return `false` to reject the collection and everything
    /// below it.
    fn collection(&mut self, collection: &Collection) -> bool {
        let _ = collection;
        true
    }

    /// Called once per control of the requested direction whose
    /// collection chain was accepted. Return `false` to skip the
    /// control's field events.
    fn control(&mut self, control: &Control) -> bool {
        let _ = control;
        true
    }

    /// A constant (padding) slot of `control.report_size()` bits at
    /// `offset`.
    fn constant(&mut self, control: &Control, offset: usize);

    /// An array slot: the value transmitted in the slot selects one usage
    /// out of the `usage_minimum..=usage_maximum` range.
    fn array(
        &mut self,
        control: &Control,
        usage_minimum: Option<Usage>,
        usage_maximum: Option<Usage>,
        offset: usize,
    );

    /// A variable slot dedicated to `usages` (one usage, or one per
    /// Delimiter alternative).
    fn variable(&mut self, control: &Control, usages: &[Usage], offset: usize);
}

/// A fully parsed report descriptor: reports ordered by ID, plus the
/// collection tree they reference.
#[derive(Debug, Default)]
pub struct ReportDescriptor {
    reports: BTreeMap<i32, Report>,
    collections: Vec<Collection>,
}

impl ReportDescriptor {
    /// The reports of this descriptor, ordered by ascending report ID.
    pub fn reports(&self) -> impl Iterator<Item = &Report> {
        self.reports.values()
    }

    /// The report with the given ID, if any.
    pub fn report(&self, id: i32) -> Option<&Report> {
        self.reports.get(&id)
    }

    /// All collections of this descriptor in the order they were opened.
    /// [Collection::parent] and [Control::parent] index into this slice.
    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    /// The ordered set of usages attached to any ancestor collection of
    /// any control in a report that contains the given direction.
    pub fn usage_set(&self, direction: Direction) -> BTreeSet<Usage> {
        let mut result = BTreeSet::new();

        for report in self.reports.values() {
            if !report.directions.contains(&direction) {
                continue;
            }
            for control in &report.controls {
                let mut parent = control.parent;
                while let Some(index) = parent {
                    let collection = &self.collections[index];
                    result.extend(collection.usages.iter().copied());
                    parent = collection.parent;
                }
            }
        }

        result
    }

    /// Walk the controls of the given report in declaration order and
    /// emit one event per slot of every control matching `direction`.
    ///
    /// Bit offsets are accumulated per direction: a control contributes
    /// `report_size * report_count` bits whether or not the evaluator
    /// accepted it, and controls of other directions contribute nothing.
    pub fn evaluate(
        &self,
        report_id: i32,
        direction: Direction,
        evaluator: &mut dyn Evaluator,
    ) -> Result<&Self> {
        let report = self
            .reports
            .get(&report_id)
            .ok_or(ParserError::NotFound { id: report_id })?;

        let mut known: HashMap<usize, bool> = HashMap::new();
        let mut offset = 0usize;

        for control in &report.controls {
            if control.direction != direction {
                continue;
            }

            let accepted = match control.parent {
                None => true,
                Some(index) => self.known_collection(index, evaluator, &mut known),
            };

            if accepted && evaluator.control(control) {
                let locals = &control.locals;
                for i in 0..control.report_count() {
                    let slot = offset + i * control.report_size();
                    if control.flags.contains(Flag::Constant) {
                        evaluator.constant(control, slot);
                    } else if control.flags.contains(Flag::Variable) {
                        evaluator.variable(control, &locals.usages_for_index(i), slot);
                    } else {
                        ensure!(
                            locals.usages.is_empty(),
                            ParserError::InvalidArgument {
                                message: "array control with delimited usages".into(),
                            }
                        );
                        evaluator.array(
                            control,
                            locals.usage.minimum().map(|u| Usage(u as u32)),
                            locals.usage.maximum().map(|u| Usage(u as u32)),
                            slot,
                        );
                    }
                }
            }

            offset += control.report_size() * control.report_count();
        }

        Ok(self)
    }

    // Resolve whether a collection chain is accepted, invoking
    // Evaluator::collection at most once per collection (parents first)
    // and short-circuiting below a rejected ancestor.
    fn known_collection(
        &self,
        index: usize,
        evaluator: &mut dyn Evaluator,
        known: &mut HashMap<usize, bool>,
    ) -> bool {
        let accepted = match self.collections[index].parent {
            None => true,
            Some(parent) => self.known_collection(parent, evaluator, known),
        };
        if !accepted {
            return false;
        }

        if let Some(&k) = known.get(&index) {
            return k;
        }
        let k = evaluator.collection(&self.collections[index]);
        known.insert(index, k);
        k
    }

    fn add_control(&mut self, control: Control) {
        let report = self
            .reports
            .entry(control.globals.report_id)
            .or_insert_with(|| Report::new(control.globals.report_id));
        report.directions.insert(control.direction);
        report.controls.push(control);
    }
}

impl TryFrom<&[u8]> for ReportDescriptor {
    type Error = ParserError;

    fn try_from(bytes: &[u8]) -> Result<ReportDescriptor> {
        parse_report_descriptor(bytes)
    }
}

fn parse_report_descriptor(bytes: &[u8]) -> Result<ReportDescriptor> {
    let items = hid::ReportDescriptorItems::try_from(bytes)?;

    let mut descriptor = ReportDescriptor::default();
    let mut stack: Vec<GlobalState> = Vec::new();
    let mut gs = GlobalState::default();
    let mut ls = LocalState::default();
    let mut collection: Option<usize> = None;
    let mut last_tag: Option<u8> = None;

    for rdesc_item in items.iter() {
        let item = rdesc_item.item();
        // A local Usage/DesignatorIndex/StringIndex extends the previous
        // one into a list only when the very same tag number repeats
        // back-to-back.
        let repeat = last_tag == Some(item.tag());

        match item.kind() {
            ItemKind::Main => {
                match item.tag() {
                    8 | 9 | 11 => {
                        let direction = match item.tag() {
                            8 => Direction::Input,
                            9 => Direction::Output,
                            _ => Direction::Feature,
                        };
                        descriptor.add_control(Control {
                            direction,
                            flags: Flags::from_bits(item.unsigned()),
                            parent: collection,
                            globals: gs,
                            locals: ls.clone(),
                        });
                    }
                    10 => {
                        descriptor.collections.push(Collection {
                            id: descriptor.collections.len() as u32 + 1,
                            kind: CollectionKind::from(item.unsigned() as u8),
                            parent: collection,
                            usages: ls.usages_for_index(0),
                            designator: ls.designator.for_index(0),
                            string: ls.string.for_index(0),
                            globals: gs,
                        });
                        collection = Some(descriptor.collections.len() - 1);
                    }
                    12 => {
                        let Some(index) = collection else {
                            return Err(ParserError::InvalidArgument {
                                message: format!("{item} outside Collection"),
                            });
                        };
                        collection = descriptor.collections[index].parent;
                    }
                    tag => {
                        return Err(ParserError::UnsupportedTag {
                            kind: ItemKind::Main,
                            tag,
                        })
                    }
                }
                ls = LocalState::default();
            }
            ItemKind::Global => match item.tag() {
                0 => gs.usage_page = item.unsigned() as i32,
                1 => gs.logical_minimum = item.value(),
                2 => gs.logical_maximum = item.value(),
                3 => gs.physical_minimum = item.value(),
                4 => gs.physical_maximum = item.value(),
                5 => gs.unit_exponent = item.value(),
                6 => gs.unit = item.value(),
                7 => gs.report_size = item.unsigned() as i32,
                8 => gs.report_id = item.unsigned() as i32,
                9 => gs.report_count = item.unsigned() as i32,
                10 => stack.push(gs),
                11 => gs = stack.pop().ok_or(ParserError::StackUnderflow)?,
                tag => {
                    return Err(ParserError::UnsupportedTag {
                        kind: ItemKind::Global,
                        tag,
                    })
                }
            },
            ItemKind::Local => {
                // A short Usage combines with the global Usage Page; a
                // 4-byte one is already fully qualified.
                let usage = if item.length() > 2 {
                    item.value()
                } else {
                    (gs.usage_page << 16) | item.unsigned() as i32
                };

                match item.tag() {
                    0 => {
                        if repeat {
                            ls.usage_mut().add(usage);
                        } else {
                            ls.usage_mut().set(usage);
                        }
                    }
                    1 => ls.usage_mut().min = Some(usage),
                    2 => ls.usage_mut().max = Some(usage),
                    3 => {
                        if repeat {
                            ls.designator.add(item.unsigned() as i32);
                        } else {
                            ls.designator.set(item.unsigned() as i32);
                        }
                    }
                    4 => ls.designator.min = Some(item.unsigned() as i32),
                    5 => ls.designator.max = Some(item.unsigned() as i32),
                    7 => {
                        if repeat {
                            ls.string.add(item.unsigned() as i32);
                        } else {
                            ls.string.set(item.unsigned() as i32);
                        }
                    }
                    8 => ls.string.min = Some(item.unsigned() as i32),
                    9 => ls.string.max = Some(item.unsigned() as i32),
                    10 => ls.delimiter(item)?,
                    tag => {
                        return Err(ParserError::UnsupportedTag {
                            kind: ItemKind::Local,
                            tag,
                        })
                    }
                }
            }
            ItemKind::Reserved => {
                return Err(ParserError::NotSupported {
                    item: item.to_string(),
                })
            }
        }

        last_tag = Some(item.tag());
    }

    Ok(descriptor)
}
