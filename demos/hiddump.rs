// SPDX-License-Identifier: MIT

//! Command line demo that takes a hex-encoded HID Report Descriptor,
//! dumps its items, the usages associated with input controls, and a
//! structured walk of every report.
//!
//! ```sh
//! cargo run --example hiddump -- 05010902A1010901A100050919012903150025019503750181029501750581010501093009311581257F750895028106C0C0
//! ```

use clap::Parser;
use hideval::hid::ReportDescriptorItems;
use hideval::{bits, Collection, Control, Direction, Evaluator, ReportDescriptor, Usage};

/// Dump the structure of a HID Report Descriptor.
#[derive(Parser)]
#[command(after_help = "\
Example descriptors:
  Mouse:         05010902A1010901A100050919012903150025019503750181029501750581010\
501093009311581257F750895028106C0C0
  Media control: 050C0901A101050C150025017501950709B509B609B709CD09E209E909EA81029\
5018101C0")]
struct Arguments {
    /// The report descriptor as a hex string
    descriptor: String,
}

struct Dump;

impl Evaluator for Dump {
    fn collection(&mut self, collection: &Collection) -> bool {
        println!("{collection}");
        true
    }

    fn control(&mut self, control: &Control) -> bool {
        println!("{control}");
        true
    }

    fn constant(&mut self, control: &Control, offset: usize) {
        println!("Constant @{offset}:{}", control.report_size());
    }

    fn array(
        &mut self,
        control: &Control,
        usage_minimum: Option<Usage>,
        usage_maximum: Option<Usage>,
        offset: usize,
    ) {
        let min = usage_minimum.map(|u| u.to_string()).unwrap_or_default();
        let max = usage_maximum.map(|u| u.to_string()).unwrap_or_default();
        println!("Array {min}-{max} @{offset}:{}", control.report_size());
    }

    fn variable(&mut self, control: &Control, usages: &[Usage], offset: usize) {
        let usages: Vec<String> = usages.iter().map(|u| u.to_string()).collect();
        println!(
            "Data [{}] @{offset}:{}",
            usages.join(", "),
            control.report_size()
        );
    }
}

fn main() {
    let args = match Arguments::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(64);
        }
    };

    let raw = match bits::from_hex(&args.descriptor) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("hiddump: {e}");
            std::process::exit(64);
        }
    };

    println!("Descriptor:");
    match ReportDescriptorItems::try_from(raw.as_slice()) {
        Ok(items) => {
            for rdesc_item in items.iter() {
                println!("{}", rdesc_item.item());
            }
        }
        Err(e) => {
            eprintln!("hiddump: {e}");
            std::process::exit(1);
        }
    }

    let rdesc = match ReportDescriptor::try_from(raw.as_slice()) {
        Ok(rdesc) => rdesc,
        Err(e) => {
            eprintln!("hiddump: {e}");
            std::process::exit(1);
        }
    };

    println!();
    println!("Usages associated with collections that contain input controls:");
    for usage in rdesc.usage_set(Direction::Input) {
        println!("  {usage}");
    }

    for report in rdesc.reports() {
        for direction in report.directions() {
            println!();
            println!("{direction:?} report #{}", report.id());
            if let Err(e) = rdesc.evaluate(report.id(), *direction, &mut Dump) {
                eprintln!("hiddump: {e}");
                std::process::exit(1);
            }
        }
    }
}
