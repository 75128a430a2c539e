//! `basic_math`: arithmetic over a list of operands.

use crate::error::{ToolError, ToolResult};
use crate::protocol::Arguments;
use serde::Deserialize;
use serde_json::{Value, json};

pub const NAME: &str = "basic_math";
pub const DESCRIPTION: &str =
    "Perform basic mathematical operations (add, subtract, multiply, divide)";

const DEFAULT_PRECISION: u32 = 2;
const MAX_PRECISION: u32 = 15;

pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "operation": {
                "type": "string",
                "enum": ["add", "subtract", "multiply", "divide"]
            },
            "operands": {
                "type": "array",
                "items": {"type": "number"},
                "minItems": 2
            },
            "precision": {
                "type": "integer",
                "minimum": 0,
                "maximum": MAX_PRECISION,
                "default": DEFAULT_PRECISION
            }
        },
        "required": ["operation", "operands"]
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Deserialize)]
struct BasicMathArgs {
    operation: Operation,
    operands: Vec<f64>,
    precision: Option<u32>,
}

/// Tool handler registered under [`NAME`].
pub fn handle(arguments: &Arguments) -> ToolResult<Value> {
    let args: BasicMathArgs = serde_json::from_value(Value::Object(arguments.clone()))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

    if args.operands.len() < 2 {
        return Err(ToolError::InvalidArguments(
            "at least 2 operands are required".into(),
        ));
    }

    let precision = args.precision.unwrap_or(DEFAULT_PRECISION);
    if precision > MAX_PRECISION {
        return Err(ToolError::InvalidArguments(format!(
            "precision must be between 0 and {MAX_PRECISION}"
        )));
    }

    let result = calculate(args.operation, &args.operands)?;
    Ok(number_value(round_to(result, precision)))
}

fn calculate(operation: Operation, operands: &[f64]) -> ToolResult<f64> {
    let (first, rest) = operands
        .split_first()
        .ok_or(ToolError::MissingArgument("operands".into()))?;

    let mut acc = *first;
    for &operand in rest {
        acc = match operation {
            Operation::Add => acc + operand,
            Operation::Subtract => acc - operand,
            Operation::Multiply => acc * operand,
            Operation::Divide => {
                if operand == 0.0 {
                    return Err(ToolError::ExecutionFailed("division by zero".into()));
                }
                acc / operand
            }
        };
    }

    if !acc.is_finite() {
        return Err(ToolError::ExecutionFailed(
            "result is not a finite number".into(),
        ));
    }
    Ok(acc)
}

/// Values too large to scale have no fractional digits left to round.
fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// Integral results serialize without a fractional part (`8`, not `8.0`).
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}
