//! List change branches and offer to check one out.

use std::fmt::Write;
use std::io::BufRead;

use lib::core::formatting::styles;
use lib::git::reference::CHANGE_BRANCH_REF_PATTERN;
use tracing::{instrument, warn};

use super::{ChangeEngine, Result};

/// The local change branches, oldest first by the author date of their tip
/// commits.
#[instrument]
pub fn get_change_branches(engine: &ChangeEngine) -> Result<Vec<String>> {
    Ok(engine
        .repo
        .list_refs_by_pattern(CHANGE_BRANCH_REF_PATTERN, "authordate")?)
}

/// Interpret the user's answer to the branch menu. Returns the zero-based
/// index of the selected branch, `Ok(None)` if the user just hit enter, and
/// `Err(())` for anything that is not a number in `1..=num_branches`.
fn parse_selection(answer: &str, num_branches: usize) -> std::result::Result<Option<usize>, ()> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(None);
    }
    if !answer.chars().all(|c| c.is_ascii_digit()) {
        return Err(());
    }
    match answer.parse::<usize>() {
        Ok(selection) if (1..=num_branches).contains(&selection) => Ok(Some(selection - 1)),
        Ok(_) | Err(_) => Err(()),
    }
}

/// `list` sub-command.
#[instrument(skip(input))]
pub fn list(engine: &ChangeEngine, input: &mut dyn BufRead) -> Result<()> {
    let effects = &engine.effects;
    let glyphs = effects.get_glyphs();
    let branches = get_change_branches(engine)?;
    if branches.is_empty() {
        writeln!(
            effects.get_output_stream(),
            "You have no change branches to list"
        )?;
        return Ok(());
    }

    writeln!(effects.get_output_stream(), "Change branches:\n")?;
    for (i, branch) in branches.iter().enumerate() {
        let summary = engine.repo.log_oneline(branch)?;
        write!(
            effects.get_output_stream(),
            "{:>2}. {} {}",
            i + 1,
            glyphs.render(&styles::BRANCH, branch),
            summary
        )?;
    }

    write!(
        effects.get_output_stream(),
        "\nSelect a branch number to check out, or hit enter to exit: "
    )?;
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(0) => return Ok(()),
        Ok(_) => {}
        Err(err) => {
            warn!(?err, "Could not read selection");
            return Ok(());
        }
    }

    match parse_selection(&answer, branches.len()) {
        Ok(None) => {}
        Ok(Some(index)) => engine.repo.checkout(&branches[index])?,
        Err(()) => writeln!(effects.get_output_stream(), "Not a valid selection")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("\n", 3), Ok(None));
        assert_eq!(parse_selection("1\n", 3), Ok(Some(0)));
        assert_eq!(parse_selection(" 3 \n", 3), Ok(Some(2)));
        assert_eq!(parse_selection("0\n", 3), Err(()));
        assert_eq!(parse_selection("4\n", 3), Err(()));
        assert_eq!(parse_selection("-1\n", 3), Err(()));
        assert_eq!(parse_selection("+1\n", 3), Err(()));
        assert_eq!(parse_selection("two\n", 3), Err(()));
        assert_eq!(parse_selection("99999999999999999999999\n", 3), Err(()));
    }
}
