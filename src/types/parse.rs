//! T-SQL type-name parser using nom.
//!
//! ```text
//! DECIMAL(18, 2)   NVARCHAR(MAX)   [dbo].[int]   double precision
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::error::{LowerError, LowerResult};

/// Length/precision argument of a type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeArg {
    Size(u32),
    Max,
}

/// A parsed type reference: upper-cased base name plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlType {
    pub name: String,
    pub args: Vec<TypeArg>,
}

/// Parse a complete type name.
pub fn parse_type_name(input: &str) -> LowerResult<SqlType> {
    match all_consuming(delimited(multispace0, parse_sql_type, multispace0))(input) {
        Ok((_, ty)) => Ok(ty),
        Err(_) => Err(LowerError::UnknownType(input.trim().to_string())),
    }
}

fn parse_sql_type(input: &str) -> IResult<&str, SqlType> {
    let (input, _) = opt(pair(parse_name_part, char('.')))(input)?;
    let (input, name) = parse_base_name(input)?;
    let (input, args) = opt(preceded(multispace0, parse_args))(input)?;
    Ok((
        input,
        SqlType {
            name,
            args: args.unwrap_or_default(),
        },
    ))
}

fn parse_base_name(input: &str) -> IResult<&str, String> {
    alt((
        // Two-word spellings come first so `double` does not stop early.
        value(
            "FLOAT".to_string(),
            tuple((tag_no_case("double"), multispace1, tag_no_case("precision"))),
        ),
        value(
            "VARCHAR".to_string(),
            tuple((tag_no_case("character"), multispace1, tag_no_case("varying"))),
        ),
        map(parse_name_part, |s| s.to_uppercase()),
    ))(input)
}

/// `int` or `[int]`
fn parse_name_part(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('['), parse_word, char(']')),
        parse_word,
    ))(input)
}

fn parse_word(input: &str) -> IResult<&str, &str> {
    recognize(take_while1(|c: char| c.is_alphanumeric() || c == '_'))(input)
}

fn parse_args(input: &str) -> IResult<&str, Vec<TypeArg>> {
    delimited(
        pair(char('('), multispace0),
        separated_list1(tuple((multispace0, char(','), multispace0)), parse_arg),
        pair(multispace0, char(')')),
    )(input)
}

fn parse_arg(input: &str) -> IResult<&str, TypeArg> {
    alt((
        value(TypeArg::Max, tag_no_case("max")),
        map_res(digit1, |d: &str| d.parse::<u32>().map(TypeArg::Size)),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let t = parse_type_name("int").unwrap();
        assert_eq!(t.name, "INT");
        assert!(t.args.is_empty());
    }

    #[test]
    fn test_parse_args() {
        let t = parse_type_name("DECIMAL(18, 2)").unwrap();
        assert_eq!(t.name, "DECIMAL");
        assert_eq!(t.args, vec![TypeArg::Size(18), TypeArg::Size(2)]);

        let t = parse_type_name(" nvarchar ( max ) ").unwrap();
        assert_eq!(t.name, "NVARCHAR");
        assert_eq!(t.args, vec![TypeArg::Max]);
    }

    #[test]
    fn test_parse_bracketed_and_qualified() {
        assert_eq!(parse_type_name("[dbo].[money]").unwrap().name, "MONEY");
        assert_eq!(parse_type_name("double precision").unwrap().name, "FLOAT");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_type_name("DECIMAL(18,"),
            Err(LowerError::UnknownType(_))
        ));
        assert!(parse_type_name("").is_err());
    }
}
