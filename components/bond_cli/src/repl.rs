//! REPL (Read-Eval-Print Loop) implementation

use crate::error::{CliError, CliResult};
use crate::runtime::Runtime;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Run the interactive REPL until `exit` or Ctrl-D.
pub fn run_repl(runtime: &mut Runtime) -> CliResult<()> {
    let mut editor = DefaultEditor::new()
        .map_err(|e| CliError::Repl(format!("failed to initialize editor: {}", e)))?;

    println!("Bond {}", env!("CARGO_PKG_VERSION"));
    println!("Type .help for commands, exit to quit.");

    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "> " } else { "... " };

        match editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if buffer.is_empty() {
                    if matches!(trimmed, "exit" | "quit" | ".exit") {
                        break;
                    }
                    if trimmed.starts_with('.') {
                        handle_command(trimmed, runtime);
                        continue;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                } else {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                if !is_input_complete(&buffer) {
                    continue;
                }
                let _ = editor.add_history_entry(buffer.as_str());
                match runtime.eval_line(&buffer) {
                    Ok(Some(repr)) => println!("{}", repr),
                    Ok(None) => {}
                    Err(e) => eprintln!("{}", e.report()),
                }
                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                if buffer.is_empty() {
                    println!("Press Ctrl-D or type exit to quit");
                } else {
                    println!("^C");
                    buffer.clear();
                }
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(CliError::Repl(format!("readline error: {}", err))),
        }
    }

    Ok(())
}

fn handle_command(command: &str, runtime: &mut Runtime) {
    match command {
        ".help" => {
            println!("REPL commands:");
            println!("  .help     show this message");
            println!("  .gc       show heap statistics");
            println!("  .clear    clear the screen");
            println!("  .exit     leave the REPL (also exit, quit, Ctrl-D)");
        }
        ".gc" => {
            let stats = runtime.gc_stats();
            println!(
                "live {}  immortal {}  collections {}  freed {}  limit {}",
                stats.live,
                stats.immortals,
                stats.collections,
                stats.total_freed,
                stats.allocation_limit
            );
        }
        ".clear" => print!("\x1B[2J\x1B[1;1H"),
        _ => {
            println!("Unknown command: {}", command);
            println!("Type .help for available commands");
        }
    }
}

/// True once braces, brackets and parens balance outside string literals
/// and `//` comments.
pub(crate) fn is_input_complete(input: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            _ => {}
        }
    }

    // Over-closed input is complete so the compiler can report it.
    depth <= 0 && !in_string
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_input_complete_simple() {
        assert!(is_input_complete("var x = 42;"));
        assert!(is_input_complete("println(\"hello\");"));
    }

    #[test]
    fn test_is_input_complete_open_block() {
        assert!(!is_input_complete("fn f(x) {"));
        assert!(!is_input_complete("if x {\n  println(x);"));
        assert!(!is_input_complete("var xs = [1, 2,"));
    }

    #[test]
    fn test_is_input_complete_closed_block() {
        assert!(is_input_complete("fn f(x) { return x; }"));
        assert!(is_input_complete("struct P { var x; var y; }"));
    }

    #[test]
    fn test_brackets_inside_strings_and_comments_are_ignored() {
        assert!(is_input_complete("println(\"{\");"));
        assert!(is_input_complete("println(\"\\\"{\");"));
        assert!(is_input_complete("var x = 1; // {"));
        assert!(!is_input_complete("var s = \"open"));
    }

    #[test]
    fn test_extra_closer_is_complete() {
        assert!(is_input_complete("}"));
    }
}
