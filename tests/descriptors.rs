// SPDX-License-Identifier: MIT
//
// End-to-end tests against report descriptors recorded from real devices.

use hideval::{
    bits, Collection, CollectionKind, Control, Direction, Evaluator, ParserError, ReportDescriptor,
    Usage,
};

const MOUSE: &str = "05010902A1010901A100050919012903150025019503750181029501750581010501093009311581257F750895028106C0C0";
const MEDIA_CONTROL: &str =
    "050C0901A101050C150025017501950709B509B609B709CD09E209E909EA810295018101C0";
const KEYBOARD: &str = "05010906A101050719E029E71500250175019508810295017508810195057501050819012905910295017503910195067508150025650507190029658100C0";
const PS3_CONTROLLER: &str = "05010904A101A102850175089501150026FF00810375019513150025013500450105091901291381027501950D0600FF8103150026FF0005010901A10075089504350046FF0009300931093209358102C0050175089527090181027508953009019102750895300901B102C0A1028502750895300901B102C0A10285EE750895300901B102C0A10285EF750895300901B102C0C0";
const BARCODE_SCANNER: &str = "058C0902A1010912A1028502150026FF00750895010501093B81029503058C09FB09FC09FD8102953809FE8202020666FF9502090009008102058C25017501950809FF8102C00914A10285041500250175019508095F0960098509869186C006FFFF0901A10285F0150026FF007508953F0902820202953F0903920202C0C0";

#[derive(Debug, PartialEq, Eq)]
enum Event {
    Collection(u32),
    Control,
    Constant {
        offset: usize,
        size: usize,
    },
    Array {
        min: Option<Usage>,
        max: Option<Usage>,
        offset: usize,
        size: usize,
    },
    Variable {
        usages: Vec<Usage>,
        offset: usize,
        size: usize,
    },
}

fn variable(usage: u32, offset: usize, size: usize) -> Event {
    Event::Variable {
        usages: vec![Usage(usage)],
        offset,
        size,
    }
}

/// Records every callback in order; optionally rejects collections by id
/// or all controls.
#[derive(Default)]
struct Recorder {
    events: Vec<Event>,
    reject_collections: Vec<u32>,
    reject_controls: bool,
}

impl Evaluator for Recorder {
    fn collection(&mut self, collection: &Collection) -> bool {
        self.events.push(Event::Collection(collection.id()));
        !self.reject_collections.contains(&collection.id())
    }

    fn control(&mut self, _control: &Control) -> bool {
        self.events.push(Event::Control);
        !self.reject_controls
    }

    fn constant(&mut self, control: &Control, offset: usize) {
        self.events.push(Event::Constant {
            offset,
            size: control.report_size(),
        });
    }

    fn array(
        &mut self,
        control: &Control,
        min: Option<Usage>,
        max: Option<Usage>,
        offset: usize,
    ) {
        self.events.push(Event::Array {
            min,
            max,
            offset,
            size: control.report_size(),
        });
    }

    fn variable(&mut self, control: &Control, usages: &[Usage], offset: usize) {
        self.events.push(Event::Variable {
            usages: usages.to_vec(),
            offset,
            size: control.report_size(),
        });
    }
}

fn descriptor(hex: &str) -> ReportDescriptor {
    let bytes = bits::from_hex(hex).unwrap();
    ReportDescriptor::try_from(bytes.as_slice()).unwrap()
}

#[test]
fn mouse_structure() {
    let rdesc = descriptor(MOUSE);
    let reports: Vec<_> = rdesc.reports().collect();
    assert_eq!(reports.len(), 1);
    let report = reports[0];
    assert_eq!(report.id(), 0);
    assert_eq!(
        report.directions().iter().copied().collect::<Vec<_>>(),
        vec![Direction::Input]
    );
    assert_eq!(report.controls().len(), 3);
}

#[test]
fn mouse_evaluation() {
    let rdesc = descriptor(MOUSE);
    let mut recorder = Recorder::default();
    rdesc.evaluate(0, Direction::Input, &mut recorder).unwrap();

    assert_eq!(
        recorder.events,
        vec![
            Event::Collection(1),
            Event::Collection(2),
            Event::Control,
            variable(0x00090001, 0, 1),
            variable(0x00090002, 1, 1),
            variable(0x00090003, 2, 1),
            Event::Control,
            Event::Constant { offset: 3, size: 5 },
            Event::Control,
            variable(0x00010030, 8, 8),
            variable(0x00010031, 16, 8),
        ]
    );
}

#[test]
fn mouse_usage_set() {
    let rdesc = descriptor(MOUSE);
    let usages: Vec<Usage> = rdesc.usage_set(Direction::Input).into_iter().collect();
    assert_eq!(usages, vec![Usage(0x00010001), Usage(0x00010002)]);
}

#[test]
fn media_control_evaluation() {
    let rdesc = descriptor(MEDIA_CONTROL);
    let mut recorder = Recorder::default();
    rdesc.evaluate(0, Direction::Input, &mut recorder).unwrap();

    assert_eq!(
        recorder.events,
        vec![
            Event::Collection(1),
            Event::Control,
            variable(0x000c00b5, 0, 1),
            variable(0x000c00b6, 1, 1),
            variable(0x000c00b7, 2, 1),
            variable(0x000c00cd, 3, 1),
            variable(0x000c00e2, 4, 1),
            variable(0x000c00e9, 5, 1),
            variable(0x000c00ea, 6, 1),
            Event::Control,
            Event::Constant { offset: 7, size: 1 },
        ]
    );
}

#[test]
fn keyboard_input_evaluation() {
    let rdesc = descriptor(KEYBOARD);
    let mut recorder = Recorder::default();
    rdesc.evaluate(0, Direction::Input, &mut recorder).unwrap();

    let mut expected = vec![Event::Collection(1), Event::Control];
    // eight modifier keys, one bit each
    for i in 0..8 {
        expected.push(variable(0x000700e0 + i as u32, i, 1));
    }
    // reserved byte
    expected.push(Event::Control);
    expected.push(Event::Constant { offset: 8, size: 8 });
    // six key array slots; the output controls in between do not
    // contribute to the input offsets
    expected.push(Event::Control);
    for i in 0..6 {
        expected.push(Event::Array {
            min: Some(Usage(0x00070000)),
            max: Some(Usage(0x00070065)),
            offset: 16 + i * 8,
            size: 8,
        });
    }
    assert_eq!(recorder.events, expected);
}

#[test]
fn keyboard_output_evaluation() {
    let rdesc = descriptor(KEYBOARD);
    let mut recorder = Recorder::default();
    rdesc.evaluate(0, Direction::Output, &mut recorder).unwrap();

    let mut expected = vec![Event::Collection(1), Event::Control];
    // five LEDs, one bit each, starting over at offset 0
    for i in 0..5 {
        expected.push(variable(0x00080001 + i as u32, i, 1));
    }
    expected.push(Event::Control);
    expected.push(Event::Constant { offset: 5, size: 3 });
    assert_eq!(recorder.events, expected);
}

#[test]
fn ps3_controller_reports() {
    let rdesc = descriptor(PS3_CONTROLLER);
    let ids: Vec<i32> = rdesc.reports().map(|r| r.id()).collect();
    assert_eq!(ids, vec![1, 2, 238, 239]);

    let report = rdesc.report(1).unwrap();
    assert!(report.directions().contains(&Direction::Input));
    assert!(report.directions().contains(&Direction::Output));
    assert!(report.directions().contains(&Direction::Feature));
}

#[test]
fn barcode_scanner_reports() {
    let rdesc = descriptor(BARCODE_SCANNER);
    let ids: Vec<i32> = rdesc.reports().map(|r| r.id()).collect();
    assert_eq!(ids, vec![2, 4, 240]);

    // Application collection at the root, Logical collections nested in it
    let collections = rdesc.collections();
    assert_eq!(collections[0].kind(), CollectionKind::Application);
    assert_eq!(collections[0].parent(), None);
    assert_eq!(collections[1].kind(), CollectionKind::Logical);
    assert_eq!(collections[1].parent(), Some(0));

    assert!(rdesc
        .usage_set(Direction::Input)
        .contains(&Usage(0x008c0002)));
}

#[test]
fn evaluate_unknown_report() {
    let rdesc = descriptor(MOUSE);
    let mut recorder = Recorder::default();
    assert!(matches!(
        rdesc.evaluate(5, Direction::Input, &mut recorder),
        Err(ParserError::NotFound { id: 5 })
    ));
    assert!(recorder.events.is_empty());
}

#[test]
fn rejected_root_collection_short_circuits() {
    let rdesc = descriptor(MOUSE);
    let mut recorder = Recorder {
        reject_collections: vec![1],
        ..Default::default()
    };
    rdesc.evaluate(0, Direction::Input, &mut recorder).unwrap();

    // The nested collection is never visited and no control or field
    // events fire; the root collection is asked exactly once.
    assert_eq!(recorder.events, vec![Event::Collection(1)]);
}

#[test]
fn rejected_inner_collection_skips_controls() {
    let rdesc = descriptor(MOUSE);
    let mut recorder = Recorder {
        reject_collections: vec![2],
        ..Default::default()
    };
    rdesc.evaluate(0, Direction::Input, &mut recorder).unwrap();

    // All mouse controls sit below collection 2
    assert_eq!(
        recorder.events,
        vec![Event::Collection(1), Event::Collection(2)]
    );
}

#[test]
fn rejected_controls_still_advance_offsets() {
    let rdesc = descriptor(MEDIA_CONTROL);

    struct SecondOnly {
        inner: Recorder,
        seen: usize,
    }
    impl Evaluator for SecondOnly {
        fn control(&mut self, _control: &Control) -> bool {
            self.seen += 1;
            self.seen == 2
        }
        fn constant(&mut self, control: &Control, offset: usize) {
            self.inner.constant(control, offset);
        }
        fn array(
            &mut self,
            control: &Control,
            min: Option<Usage>,
            max: Option<Usage>,
            offset: usize,
        ) {
            self.inner.array(control, min, max, offset);
        }
        fn variable(&mut self, control: &Control, usages: &[Usage], offset: usize) {
            self.inner.variable(control, usages, offset);
        }
    }

    let mut evaluator = SecondOnly {
        inner: Recorder::default(),
        seen: 0,
    };
    rdesc.evaluate(0, Direction::Input, &mut evaluator).unwrap();

    // The skipped 7-bit control still occupies bits 0..7
    assert_eq!(
        evaluator.inner.events,
        vec![Event::Constant { offset: 7, size: 1 }]
    );
}
