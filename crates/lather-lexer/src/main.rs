use lather_lexer::{lex_str, LexError, Rule};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;
use try_next::TryNextWithContext;

/// File named on the command line, or stdin
fn read_input() -> io::Result<(String, String)> {
    match env::args().nth(1) {
        Some(filename) => {
            let source = fs::read_to_string(&filename)?;
            Ok((filename, source))
        }
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(("<stdin>".to_string(), buffer))
        }
    }
}

/// 1-based line and column of a byte offset
fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

fn report(name: &str, source: &str, err: &LexError) -> ! {
    let (line, column) = line_col(source, err.offset());
    eprintln!("{}:{}:{}: {}", name, line, column, err);
    process::exit(1);
}

fn main() {
    let (name, input) = read_input().unwrap_or_else(|e| {
        eprintln!("Error reading input: {}", e);
        process::exit(1);
    });

    let mut lexer = lex_str(&input).unwrap_or_else(|e| report(&name, &input, &e));
    let mut context = ();
    let mut count = 0usize;

    // One token per line: kind, byte range, text
    loop {
        match lexer.try_next_with_context(&mut context) {
            Ok(Some(token)) if token.rule == Rule::End => break,
            Ok(Some(token)) => {
                count += 1;
                println!("{:?} @ {}..{} = {:?}", token.rule, token.span.start, token.span.end, token.text);
            }
            Ok(None) => break,
            Err(e) => report(&name, &input, &e),
        }
    }
    eprintln!("{} token(s)", count);
}
