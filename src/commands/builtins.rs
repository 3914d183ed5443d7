use super::{EXIT_FATAL, HandlerResult};
use crate::registry::BUILTIN_HANDLERS;
use std::io::{self, Write};

/// Handle `--list-builtins`.
pub fn handle_list_builtins() -> HandlerResult {
    match write_builtins(&mut io::stdout().lock()) {
        Ok(()) => HandlerResult::Success,
        Err(e) => {
            eprintln!("Failed to write handler list: {e}");
            HandlerResult::Error(EXIT_FATAL)
        }
    }
}

/// One line per built-in handler: name, then what it checks.
pub fn write_builtins(out: &mut impl Write) -> io::Result<()> {
    let width = BUILTIN_HANDLERS
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    for (name, description) in BUILTIN_HANDLERS {
        writeln!(out, "{name:<width$}  {description}")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_every_builtin() {
        let mut out = Vec::new();
        write_builtins(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), BUILTIN_HANDLERS.len());
        assert!(text.lines().next().unwrap().starts_with("gzip "));
        assert!(text.contains("sqlite3"));
        assert!(text.contains("PRAGMA integrity_check"));
    }
}
