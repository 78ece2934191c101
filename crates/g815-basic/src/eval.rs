//! Expression evaluation.

use crate::adapter::MachineAdapter;
use crate::ast::{BinOp, BuiltinFn, Expr, UnaryOp, Value};
use crate::errors::{BasicError, BasicResult};
use crate::vars::VarStore;

pub struct EvalCtx<'a, A: MachineAdapter> {
    pub vars: &'a mut VarStore,
    pub adapter: &'a mut A,
    /// A simple deterministic PRNG state for `RND`, avoiding a dependency
    /// on the host clock (the interpreter has no notion of wall time).
    pub rng_state: &'a mut u64,
}

fn next_rand(state: &mut u64) -> f64 {
    // xorshift64*, good enough for BASIC's RND and fully deterministic.
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    (*state >> 11) as f64 / (1u64 << 53) as f64
}

pub fn eval<A: MachineAdapter>(expr: &Expr, ctx: &mut EvalCtx<'_, A>) -> BasicResult<Value> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Var(name) => Ok(ctx.vars.get_scalar(name)),
        Expr::ArrayElem(name, idx_exprs) => {
            let indices = eval_indices(idx_exprs, ctx)?;
            ctx.vars.get_array_elem(name, &indices)
        }
        Expr::Unary(op, inner) => {
            let v = eval(inner, ctx)?;
            Ok(match op {
                UnaryOp::Neg => Value::Number(-v.as_number()),
                UnaryOp::Pos => Value::Number(v.as_number()),
                UnaryOp::Not => Value::Number(bool_to_num(!v.truthy())),
            })
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, ctx),
        Expr::Call(f, args) => eval_call(*f, args, ctx),
    }
}

fn eval_indices<A: MachineAdapter>(exprs: &[Expr], ctx: &mut EvalCtx<'_, A>) -> BasicResult<Vec<usize>> {
    exprs.iter().map(|e| Ok(eval(e, ctx)?.as_int().max(0) as usize)).collect()
}

fn bool_to_num(b: bool) -> f64 {
    if b {
        -1.0
    } else {
        0.0
    }
}

fn eval_binary<A: MachineAdapter>(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &mut EvalCtx<'_, A>,
) -> BasicResult<Value> {
    let l = eval(lhs, ctx)?;
    let r = eval(rhs, ctx)?;

    if matches!(op, BinOp::Add) && (l.is_string() || r.is_string()) {
        return match (l, r) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            _ => Err(BasicError::type_mismatch()),
        };
    }

    if matches!(op, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge) {
        let ordering = match (&l, &r) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
            _ => return Err(BasicError::type_mismatch()),
        };
        use std::cmp::Ordering::*;
        let result = match op {
            BinOp::Eq => ordering == Equal,
            BinOp::Ne => ordering != Equal,
            BinOp::Lt => ordering == Less,
            BinOp::Le => ordering != Greater,
            BinOp::Gt => ordering == Greater,
            BinOp::Ge => ordering != Less,
            _ => unreachable!(),
        };
        return Ok(Value::Number(bool_to_num(result)));
    }

    let a = l.as_number();
    let b = r.as_number();
    let n = match op {
        BinOp::Or => bool_to_num(a != 0.0 || b != 0.0),
        BinOp::Xor => bool_to_num((a != 0.0) ^ (b != 0.0)),
        BinOp::And => bool_to_num(a != 0.0 && b != 0.0),
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(BasicError::division_by_zero());
            }
            a / b
        }
        BinOp::IDiv => {
            if b == 0.0 {
                return Err(BasicError::division_by_zero());
            }
            (a.trunc() as i64 / b.trunc() as i64) as f64
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(BasicError::division_by_zero());
            }
            (a.trunc() as i64 % b.trunc() as i64) as f64
        }
        BinOp::Pow => a.powf(b),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => unreachable!(),
    };
    Ok(Value::Number(n))
}

fn eval_call<A: MachineAdapter>(f: BuiltinFn, args: &[Expr], ctx: &mut EvalCtx<'_, A>) -> BasicResult<Value> {
    let values: Vec<Value> = args.iter().map(|a| eval(a, ctx)).collect::<BasicResult<_>>()?;
    let num = |i: usize| values.get(i).map(Value::as_number).unwrap_or(0.0);
    let string = |i: usize| -> String {
        match values.get(i) {
            Some(Value::Str(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            None => String::new(),
        }
    };

    Ok(match f {
        BuiltinFn::Inp => Value::Number(f64::from(ctx.adapter.in8(num(0) as u16))),
        BuiltinFn::Peek => Value::Number(f64::from(ctx.adapter.peek8(num(0) as u16))),
        BuiltinFn::Abs => Value::Number(num(0).abs()),
        BuiltinFn::Int => Value::Number(num(0).floor()),
        BuiltinFn::Rnd => Value::Number(next_rand(ctx.rng_state)),
        BuiltinFn::Len => Value::Number(string(0).chars().count() as f64),
        BuiltinFn::Chr => {
            let code = num(0) as u32 as u8;
            Value::Str((code as char).to_string())
        }
        BuiltinFn::Asc => Value::Number(string(0).chars().next().map(|c| c as u32 as f64).unwrap_or(0.0)),
        BuiltinFn::StrDollar => Value::Str(format_number(num(0))),
        BuiltinFn::Val => Value::Number(string(0).trim().parse().unwrap_or(0.0)),
        BuiltinFn::Left => {
            let s = string(0);
            let n = num(1).max(0.0) as usize;
            Value::Str(s.chars().take(n).collect())
        }
        BuiltinFn::Right => {
            let s = string(0);
            let n = num(1).max(0.0) as usize;
            let len = s.chars().count();
            Value::Str(s.chars().skip(len.saturating_sub(n)).collect())
        }
        BuiltinFn::Mid => {
            let s = string(0);
            let start = (num(1).max(1.0) as usize) - 1;
            let len = values.get(2).map(|v| v.as_number() as usize).unwrap_or(usize::MAX);
            Value::Str(s.chars().skip(start).take(len).collect())
        }
    })
}

#[must_use]
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::NullAdapter;

    fn ctx<'a>(vars: &'a mut VarStore, adapter: &'a mut NullAdapter, rng: &'a mut u64) -> EvalCtx<'a, NullAdapter> {
        EvalCtx { vars, adapter, rng_state: rng }
    }

    #[test]
    fn arithmetic_precedence() {
        let mut vars = VarStore::new();
        let mut adapter = NullAdapter;
        let mut rng = 1;
        let expr = crate::parser::parse_line("PRINT (2+3)*4").unwrap();
        let crate::ast::Stmt::Print { items, .. } = &expr.statements[0] else { panic!() };
        let crate::ast::PrintItem::Expr(e) = &items[0] else { panic!() };
        let v = eval(e, &mut ctx(&mut vars, &mut adapter, &mut rng)).unwrap();
        assert_eq!(v, Value::Number(20.0));
    }

    #[test]
    fn comparison_yields_negative_one() {
        let mut vars = VarStore::new();
        vars.set_scalar("A", Value::Number(12.0)).unwrap();
        let mut adapter = NullAdapter;
        let mut rng = 1;
        let expr = crate::parser::parse_line("IF A>=10 THEN 200").unwrap();
        let crate::ast::Stmt::If { cond, .. } = &expr.statements[0] else { panic!() };
        let v = eval(cond, &mut ctx(&mut vars, &mut adapter, &mut rng)).unwrap();
        assert_eq!(v, Value::Number(-1.0));
    }
}
