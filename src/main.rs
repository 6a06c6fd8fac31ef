use crate::codegen::Compiler;
use crate::error::Result;
use crate::lexer::Lexer;

mod args;
mod codegen;
mod error;
mod lexer;
mod token;

fn run() -> Result<()> {
    let args = args::parse_args()?;

    let source = std::fs::read_to_string(args.dir.join(&args.input))?;

    let mut result = None;
    Lexer::new(&source).run(|lines| {
        result = Some(Compiler::new().compile(&lines));
    });
    let compiled = result.expect("lexer completion runs exactly once");

    for diagnostic in compiled.diagnostics.iter() {
        eprintln!("{diagnostic}");
    }

    std::fs::write(args.output_path(), compiled.asm)?;

    Ok(())
}

fn main() -> std::process::ExitCode {
    if let Err(err) = run() {
        eprintln!("{err}");
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::SUCCESS
}
