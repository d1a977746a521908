use qif_core::{Dialect, DialectKind};
use qif_parser::parse;

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let filename = args.next().ok_or("filename argument")?;
    let dialect = match args.next() {
        Some(name) => Dialect::preset(name.parse::<DialectKind>()?),
        None => Dialect::default(),
    };
    let unparsed_file = std::fs::read_to_string(filename)?;

    let file = parse(&unparsed_file, &dialect)?;
    for ledger in file.accounts() {
        println!("{} ({}): {} entries", ledger.account.name, ledger.account.ty, ledger.events.len());
    }
    dbg!(file);
    Ok(())
}

fn main() {
    match run() {
        Err(e) => println!("Error: {}", e),
        _ => {}
    }
}
