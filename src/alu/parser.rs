use pest::{error::LineColLocation, iterators::Pairs, Parser};

use super::TemplateError;

#[derive(Parser)]
#[grammar = "alu.pest"]
pub struct AluParser;

impl AluParser {
    /// Parse a template document into its raw pair tree. Syntax errors
    /// (missing statement terminators, unknown state indicators, etc.)
    /// surface with their location in the template file.
    pub fn parse_template<'a>(
        template: &'a str,
        file: &str,
    ) -> Result<Pairs<'a, Rule>, TemplateError> {
        match Self::parse(Rule::alu, template) {
            Ok(pairs) => Ok(pairs),
            Err(err) => {
                let (line, col) = match err.line_col {
                    LineColLocation::Pos((line, col)) => (line, col),
                    LineColLocation::Span((line, col), _) => (line, col),
                };
                Err(TemplateError {
                    message: format!("Failed to parse ALU template ({})", err.variant.message()),
                    position: (file.to_string(), line, col),
                })
            }
        }
    }
}
