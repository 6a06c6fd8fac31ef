use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct ParsedArgs {
    pub dir: PathBuf,
    pub input: String,
    pub output: Option<String>,
}

pub fn parse_args() -> Result<ParsedArgs> {
    let mut args = std::env::args();
    let dir = std::env::current_dir()?;

    let mut input = None;
    let mut output = None;

    args.next().expect("first argument should be program path");

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-o" => {
                let Some(sout) = args.next() else {
                    return Error::cli("output path must be informed after -o flag");
                };

                output = Some(sout);
            }
            _ => input = Some(arg),
        }
    }

    let Some(input) = input else {
        return Error::cli("no input file provided");
    };

    Ok(ParsedArgs { dir, input, output })
}

impl ParsedArgs {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .as_ref()
            .map(|o| self.dir.join(o))
            .unwrap_or_else(|| self.dir.join(&self.input).with_extension("asm"))
    }
}
