//! Title-case normalizer
//!
//! Uppercases the first letter of every word and lowercases the rest. A word
//! is a run of alphabetic characters, so digits, apostrophes and hyphens all
//! start a new word: `"o'neil-SMITH 3rd"` becomes `"O'Neil-Smith 3Rd"`.

use crate::error::PipelineError;
use crate::etl::Transformer;
use crate::table::Cell;

/// Transformer that title-cases text cells and passes every other cell through
///
/// # Example
/// ```
/// use simple_etl::transform::TitleCase;
/// use simple_etl::etl::Transformer;
/// use simple_etl::Cell;
///
/// let output = TitleCase.transform(Cell::from("JANE DOE")).unwrap();
/// assert_eq!(output, Cell::from("Jane Doe"));
///
/// let age = TitleCase.transform(Cell::from(25)).unwrap();
/// assert_eq!(age, Cell::from(25));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TitleCase;

impl Transformer for TitleCase {
    type Input = Cell;
    type Output = Cell;

    fn transform(&self, input: Self::Input) -> Result<Self::Output, PipelineError> {
        Ok(match input {
            Cell::Text(text) => Cell::Text(title_case(&text)),
            cell @ (Cell::Number(_) | Cell::Boolean(_) | Cell::Null) => cell,
        })
    }
}

/// Title-case a string
pub fn title_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut in_word = false;

    for c in input.chars() {
        if !c.is_alphabetic() {
            output.push(c);
        } else if in_word {
            output.extend(c.to_lowercase());
        } else {
            // Only the first char of a multi-char uppercase mapping stays upper
            // ('ß' -> "Ss"), otherwise a second pass would change the result
            let mut upper = c.to_uppercase();
            if let Some(first) = upper.next() {
                output.push(first);
            }
            for rest in upper {
                output.extend(rest.to_lowercase());
            }
        }
        // Word boundaries follow what was written: 'ΐ' uppercases to a letter
        // plus combining marks, which a second pass reads as a boundary
        in_word = output.chars().next_back().is_some_and(char::is_alphabetic);
    }

    output
}
