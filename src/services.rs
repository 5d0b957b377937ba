// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Demo service exposed by `wirerpc serve`.

use async_trait::async_trait;
use serde_json::{Number, Value};

use crate::engine_core::errors::HandlerError;
use crate::engine_core::traits::Service;

/// Application error code for a division by zero.
pub const ERROR_DIVISION_BY_ZERO: i32 = -32000;

/// Arithmetic over positional numeric params, registered as `Calculator.*`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Calculator;

#[async_trait]
impl Service for Calculator {
    fn methods(&self) -> &'static [&'static str] {
        &["sum", "multiply", "divide"]
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, HandlerError> {
        let operands = numbers(&params)?;
        match method {
            "sum" => Ok(fold(&operands, 0, 0.0, i64::checked_add, |a, b| a + b)),
            "multiply" => Ok(fold(&operands, 1, 1.0, i64::checked_mul, |a, b| a * b)),
            "divide" => divide(&operands),
            other => Err(HandlerError::new(
                crate::engine_core::constants::jsonrpc::ERROR_METHOD_NOT_FOUND,
                format!("Calculator has no method {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operand {
    Int(i64),
    Float(f64),
}

impl Operand {
    fn as_f64(self) -> f64 {
        match self {
            Operand::Int(v) => v as f64,
            Operand::Float(v) => v,
        }
    }
}

fn numbers(params: &[Value]) -> Result<Vec<Operand>, HandlerError> {
    params
        .iter()
        .enumerate()
        .map(|(i, value)| match value {
            Value::Number(n) => Ok(n
                .as_i64()
                .map(Operand::Int)
                .unwrap_or_else(|| Operand::Float(n.as_f64().unwrap_or(f64::NAN)))),
            other => Err(HandlerError::invalid_params(format!(
                "param {i} is not a number: {other}"
            ))),
        })
        .collect()
}

// Integer arithmetic while every operand is an integer and nothing overflows
fn fold(
    operands: &[Operand],
    int_identity: i64,
    float_identity: f64,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Value {
    let ints: Option<i64> = operands.iter().try_fold(int_identity, |acc, op| match op {
        Operand::Int(v) => int_op(acc, *v),
        Operand::Float(_) => None,
    });
    match ints {
        Some(total) => Value::from(total),
        None => float(
            operands
                .iter()
                .fold(float_identity, |acc, op| float_op(acc, op.as_f64())),
        ),
    }
}

fn divide(operands: &[Operand]) -> Result<Value, HandlerError> {
    let [dividend, divisor] = operands else {
        return Err(HandlerError::invalid_params(format!(
            "divide takes 2 params, got {}",
            operands.len()
        )));
    };
    if divisor.as_f64() == 0.0 {
        return Err(HandlerError::new(ERROR_DIVISION_BY_ZERO, "Division by zero"));
    }
    if let (Operand::Int(a), Operand::Int(b)) = (*dividend, *divisor) {
        if a.checked_rem(b) == Some(0) {
            if let Some(quotient) = a.checked_div(b) {
                return Ok(Value::from(quotient));
            }
        }
    }
    Ok(float(dividend.as_f64() / divisor.as_f64()))
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}
