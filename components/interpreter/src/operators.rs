//! Operator semantics
//!
//! Builtin kinds are handled directly; instances fall back to their type's
//! operator slots. Also home to value equality and hashing, which the
//! `HashMap` implementation builds on.

use crate::builtins::hash_str;
use crate::object::{Object, Value};
use crate::vm::Vm;
use bytecode_system::Opcode;
use core_types::{BondError, BondResult, ErrorKind};

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(object: &Object) -> Option<Num> {
        match object {
            Object::Int(i) => Some(Num::Int(*i)),
            Object::Float(x) => Some(Num::Float(*x)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(x) => x,
        }
    }
}

fn slot_name(op: Opcode) -> &'static str {
    match op {
        Opcode::BinAdd => "__add__",
        Opcode::BinSub => "__sub__",
        Opcode::BinMul => "__mul__",
        Opcode::BinDiv => "__div__",
        Opcode::BinMod => "__mod__",
        Opcode::Lt => "__lt__",
        Opcode::Le => "__le__",
        Opcode::Gt => "__gt__",
        Opcode::Ge => "__ge__",
        Opcode::Eq => "__eq__",
        Opcode::Ne => "__ne__",
        Opcode::BitOr => "__or__",
        Opcode::BitXor => "__xor__",
        _ => "__and__",
    }
}

fn verb(op: Opcode) -> &'static str {
    match op {
        Opcode::BinAdd => "add",
        Opcode::BinSub => "subtract",
        Opcode::BinMul => "multiply",
        Opcode::BinDiv => "divide",
        Opcode::BinMod => "take the modulo of",
        Opcode::BitOr | Opcode::BitXor | Opcode::BitAnd => "apply a bitwise operator to",
        _ => "compare",
    }
}

fn division_by_zero() -> BondError {
    BondError::new(ErrorKind::DivisionByZero, "division by zero")
}

fn int_arith(op: Opcode, a: i64, b: i64) -> BondResult<i64> {
    Ok(match op {
        Opcode::BinAdd => a.wrapping_add(b),
        Opcode::BinSub => a.wrapping_sub(b),
        Opcode::BinMul => a.wrapping_mul(b),
        Opcode::BinDiv if b == 0 => return Err(division_by_zero()),
        Opcode::BinDiv => a.wrapping_div(b),
        Opcode::BinMod if b == 0 => return Err(division_by_zero()),
        Opcode::BinMod => a.wrapping_rem(b),
        Opcode::BitOr => a | b,
        Opcode::BitXor => a ^ b,
        Opcode::BitAnd => a & b,
        _ => return Err(BondError::internal("not an arithmetic opcode")),
    })
}

fn float_arith(op: Opcode, a: f64, b: f64) -> BondResult<f64> {
    Ok(match op {
        Opcode::BinAdd => a + b,
        Opcode::BinSub => a - b,
        Opcode::BinMul => a * b,
        Opcode::BinDiv | Opcode::BinMod if b == 0.0 => return Err(division_by_zero()),
        Opcode::BinDiv => a / b,
        Opcode::BinMod => a % b,
        _ => return Err(BondError::internal("not an arithmetic opcode")),
    })
}

fn compare<T: PartialOrd>(op: Opcode, a: T, b: T) -> bool {
    match op {
        Opcode::Lt => a < b,
        Opcode::Le => a <= b,
        Opcode::Gt => a > b,
        _ => a >= b,
    }
}

impl<'ctx> Vm<'ctx> {
    /// Apply a binary opcode. Both operands are still on the stack.
    pub(crate) fn binary_op(&mut self, op: Opcode, left: Value, right: Value) -> BondResult<Value> {
        match op {
            Opcode::Eq => {
                let equal = self.values_equal(left, right)?;
                return Ok(self.ctx.boolean(equal));
            }
            Opcode::Ne => {
                if let Some(slot) = self.find_slot(left, "__ne__")? {
                    return self.call_value(slot, &[left, right]);
                }
                let equal = self.values_equal(left, right)?;
                return Ok(self.ctx.boolean(!equal));
            }
            _ => {}
        }

        let (l, r) = (self.ctx.get(left)?, self.ctx.get(right)?);
        let is_compare = matches!(op, Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge);
        let is_bitwise = matches!(op, Opcode::BitOr | Opcode::BitXor | Opcode::BitAnd);

        if let (Some(a), Some(b)) = (Num::of(l), Num::of(r)) {
            if is_compare {
                let result = match (a, b) {
                    (Num::Int(a), Num::Int(b)) => compare(op, a, b),
                    _ => compare(op, a.as_f64(), b.as_f64()),
                };
                return Ok(self.ctx.boolean(result));
            }
            return match (a, b) {
                (Num::Int(a), Num::Int(b)) => {
                    let value = int_arith(op, a, b)?;
                    Ok(self.ctx.int(value))
                }
                _ if is_bitwise => Err(self.operand_error(op, left, right)),
                _ => {
                    let value = float_arith(op, a.as_f64(), b.as_f64())?;
                    Ok(self.ctx.float(value))
                }
            };
        }

        match (l, r) {
            (Object::String(a), Object::String(b)) if is_compare => {
                let result = compare(op, a.as_str(), b.as_str());
                return Ok(self.ctx.boolean(result));
            }
            (Object::String(a), Object::String(b)) if op == Opcode::BinAdd => {
                let joined = format!("{}{}", a, b);
                return Ok(self.ctx.string(joined));
            }
            (Object::List(a), Object::List(b)) if op == Opcode::BinAdd => {
                let joined = a.iter().chain(b.iter()).copied().collect();
                return Ok(self.ctx.list(joined));
            }
            _ => {}
        }

        match self.find_slot(left, slot_name(op))? {
            Some(slot) => self.call_value(slot, &[left, right]),
            None => Err(self.operand_error(op, left, right)),
        }
    }

    fn operand_error(&self, op: Opcode, left: Value, right: Value) -> BondError {
        BondError::type_error(format!(
            "unable to {} {} and {}",
            verb(op),
            self.ctx.kind_name(left),
            self.ctx.kind_name(right)
        ))
    }

    /// Unary minus.
    pub(crate) fn negate(&mut self, value: Value) -> BondResult<Value> {
        match self.ctx.get(value)? {
            Object::Int(i) => {
                let negated = i.wrapping_neg();
                Ok(self.ctx.int(negated))
            }
            Object::Float(x) => {
                let negated = -*x;
                Ok(self.ctx.float(negated))
            }
            other => Err(BondError::type_error(format!(
                "unable to negate {}",
                other.kind_name()
            ))),
        }
    }

    // =========================================================================
    // Equality and hashing
    // =========================================================================

    /// Structural equality for builtin kinds, `__eq__` for instances,
    /// identity for everything else. Values of different kinds are never
    /// equal.
    pub fn values_equal(&mut self, a: Value, b: Value) -> BondResult<bool> {
        // Pairs already under comparison count as equal, so lists that
        // contain themselves terminate.
        let mut seen: Vec<(Value, Value)> = Vec::new();
        let mut pending = vec![(a, b)];
        while let Some((a, b)) = pending.pop() {
            if a == b || seen.contains(&(a, b)) {
                continue;
            }
            seen.push((a, b));
            match (self.ctx.get(a)?, self.ctx.get(b)?) {
                (Object::Nil, Object::Nil) => {}
                (Object::Bool(x), Object::Bool(y)) if x == y => {}
                (Object::Int(x), Object::Int(y)) if x == y => {}
                (Object::Float(x), Object::Float(y)) if x == y => {}
                (Object::String(x), Object::String(y)) if x == y => {}
                (Object::Result(x), Object::Result(y)) if x.is_ok == y.is_ok => {
                    pending.push((x.value, y.value));
                }
                (Object::List(x), Object::List(y)) if x.len() == y.len() => {
                    pending.extend(x.iter().copied().zip(y.iter().copied()).rev());
                }
                (Object::Instance(_), _) | (Object::NativeInstance(_), _) => {
                    let equal = match self.find_slot(a, "__eq__")? {
                        Some(slot) => {
                            let result = self.call_value(slot, &[a, b])?;
                            self.ctx.is_truthy(result)
                        }
                        None => false,
                    };
                    if !equal {
                        return Ok(false);
                    }
                }
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Hash a map key.
    pub fn hash_value(&mut self, value: Value) -> BondResult<u64> {
        match self.ctx.get(value)? {
            Object::Nil => Ok(0),
            Object::Bool(b) => Ok(*b as u64),
            Object::Int(i) => Ok(*i as u64),
            // -0.0 == 0.0, so both must land in the same bucket
            Object::Float(x) if *x == 0.0 => Ok(0.0f64.to_bits()),
            Object::Float(x) => Ok(x.to_bits()),
            Object::String(s) => Ok(hash_str(s)),
            Object::List(_) | Object::HashMap(_) | Object::StringMap(_) => Err(
                BondError::type_error(format!("unhashable type {}", self.ctx.kind_name(value))),
            ),
            Object::Instance(_) | Object::NativeInstance(_) => {
                let slot = self.find_slot(value, "__hash__")?.ok_or_else(|| {
                    BondError::attribute_not_found("key is not hashable __hash__ not found")
                })?;
                let result = self.call_value(slot, &[value])?;
                match self.ctx.get(result)? {
                    Object::Int(i) => Ok(*i as u64),
                    other => Err(BondError::type_error(format!(
                        "__hash__ must return an Int, got {}",
                        other.kind_name()
                    ))),
                }
            }
            _ => Ok(((value.index() as u64) << 32) ^ value.generation() as u64),
        }
    }

    fn keys_equal(&mut self, key: Value, candidate: Value) -> BondResult<bool> {
        let is_instance = matches!(
            self.ctx.get(key)?,
            Object::Instance(_) | Object::NativeInstance(_)
        );
        if is_instance && key != candidate && self.find_slot(key, "__eq__")?.is_none() {
            return Err(BondError::attribute_not_found(
                "key is not comparable __eq__ not found",
            ));
        }
        self.values_equal(key, candidate)
    }

    fn find_entry(&mut self, map: Value, key: Value) -> BondResult<(u64, Option<usize>)> {
        let hash = self.hash_value(key)?;
        let candidates = match self.ctx.get(map)? {
            Object::HashMap(m) => m.candidates(hash),
            other => {
                return Err(BondError::type_error(format!(
                    "expected a HashMap, got {}",
                    other.kind_name()
                )))
            }
        };
        for (slot, candidate) in candidates {
            if self.keys_equal(key, candidate)? {
                return Ok((hash, Some(slot)));
            }
        }
        Ok((hash, None))
    }

    /// Look `key` up in a `HashMap`.
    pub fn map_get(&mut self, map: Value, key: Value) -> BondResult<Option<Value>> {
        let (_, slot) = self.find_entry(map, key)?;
        Ok(match (slot, self.ctx.get(map)?) {
            (Some(slot), Object::HashMap(m)) => m.value_at(slot),
            _ => None,
        })
    }

    /// Insert or replace `key` in a `HashMap`.
    pub fn map_set(&mut self, map: Value, key: Value, value: Value) -> BondResult<()> {
        let (hash, slot) = self.find_entry(map, key)?;
        if let Object::HashMap(m) = self.ctx.get_mut(map)? {
            match slot {
                Some(slot) => m.set_at(slot, value),
                None => m.insert_new(hash, key, value),
            }
        }
        Ok(())
    }

    /// Remove `key` from a `HashMap`, returning its value.
    pub fn map_remove(&mut self, map: Value, key: Value) -> BondResult<Option<Value>> {
        let (_, slot) = self.find_entry(map, key)?;
        Ok(match (slot, self.ctx.get_mut(map)?) {
            (Some(slot), Object::HashMap(m)) => m.remove_at(slot),
            _ => None,
        })
    }
}
