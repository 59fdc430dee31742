use crate::prelude::*;

pub(crate) mod check;


/// Prints `question` and aborts unless the operator answers with "yes".
pub(crate) fn confirm(question: &str) -> Result<()> {
    println!("{question}");
    println!("Type 'yes' to proceed.");

    let answer = std::io::stdin()
        .lines()
        .next()
        .transpose()
        .context("could not read from stdin")?
        .unwrap_or_default();
    if answer.trim() != "yes" {
        bail!("operation was not confirmed, aborting");
    }

    Ok(())
}
