//! Value built-ins: conversions, string and pattern helpers, math, random
//! numbers and list manipulation.

use rand::Rng;

use crate::errors::EngineError;
use crate::module::Builtin;
use crate::value::Value;

use super::exec::Engine;

fn char_count(s: &str) -> i64 {
    s.chars().count() as i64
}

fn clamp_index(index: i64, len: i64) -> usize {
    index.clamp(0, len) as usize
}

/// Integer when both operands are integers, float otherwise.
fn pick(a: &Value, b: &Value, int: fn(i64, i64) -> i64, float: fn(f64, f64) -> f64) -> Value {
    match (a.numeric_value(), b.numeric_value()) {
        (Value::Integer(x), Value::Integer(y)) => Value::Integer(int(x, y)),
        (x, y) => Value::Float(float(x.as_float(), y.as_float())),
    }
}

fn round_with(value: &Value, op: fn(f64) -> f64) -> Value {
    match value.numeric_value() {
        Value::Float(f) => Value::Float(op(f)),
        other => other,
    }
}

impl Engine<'_> {
    pub(crate) fn builtin(&mut self, builtin: Builtin) -> Result<(), EngineError> {
        let name = builtin.name();
        let result = match builtin {
            Builtin::AsBoolean => {
                let v = self.pop()?;
                Value::Boolean(v.is_truthy(self.ctx.heap()))
            }
            Builtin::AsInteger => Value::Integer(self.pop()?.as_integer()),
            Builtin::AsFloat => Value::Float(self.pop()?.as_float()),
            Builtin::AsString => Value::String(self.pop_text()?),
            Builtin::TypeOf => Value::string(self.pop()?.kind_name()),
            Builtin::Length => {
                let v = self.pop()?;
                Value::Integer(v.length(self.ctx.heap()) as i64)
            }
            Builtin::IsEmpty => {
                let v = self.pop()?;
                Value::Boolean(v.is_empty(self.ctx.heap()))
            }

            Builtin::StrIndexOf => {
                let needle = self.pop_text()?;
                let s = self.pop_text()?;
                let index = s.find(&needle).map(|at| char_count(&s[..at])).unwrap_or(-1);
                Value::Integer(index)
            }
            Builtin::StrSubstring => {
                let end = self.pop()?.as_integer();
                let start = self.pop()?.as_integer();
                let s = self.pop_text()?;
                let len = char_count(&s);
                let (start, end) = (clamp_index(start, len), clamp_index(end, len));
                let out: String = if start < end {
                    s.chars().skip(start).take(end - start).collect()
                } else {
                    String::new()
                };
                Value::String(out)
            }
            Builtin::StrUpper => Value::String(self.pop_text()?.to_uppercase()),
            Builtin::StrLower => Value::String(self.pop_text()?.to_lowercase()),
            Builtin::StrTrim => Value::string(self.pop_text()?.trim()),
            Builtin::StrContains => {
                let needle = self.pop_text()?;
                Value::Boolean(self.pop_text()?.contains(&needle))
            }
            Builtin::StrStartsWith => {
                let needle = self.pop_text()?;
                Value::Boolean(self.pop_text()?.starts_with(&needle))
            }
            Builtin::StrEndsWith => {
                let needle = self.pop_text()?;
                Value::Boolean(self.pop_text()?.ends_with(&needle))
            }
            Builtin::StrReplace => {
                let to = self.pop_text()?;
                let from = self.pop_text()?;
                let s = self.pop_text()?;
                if from.is_empty() {
                    Value::String(s)
                } else {
                    Value::String(s.replace(&from, &to))
                }
            }
            Builtin::StrSplit => {
                let separator = self.pop_text()?;
                let s = self.pop_text()?;
                let parts: Vec<Value> = if separator.is_empty() {
                    s.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    s.split(separator.as_str()).map(Value::string).collect()
                };
                Value::List(self.ctx.heap_mut().list_from(parts)?)
            }
            Builtin::StrJoin => {
                let separator = self.pop_text()?;
                let list = self.pop_list(name)?;
                let parts: Vec<String> = self
                    .ctx
                    .heap()
                    .items(list)
                    .iter()
                    .map(|v| self.ctx.format(v))
                    .collect();
                Value::String(parts.join(&separator))
            }
            Builtin::StrChar => {
                let index = self.pop()?.as_integer();
                let s = self.pop_text()?;
                let c = usize::try_from(index).ok().and_then(|i| s.chars().nth(i));
                Value::String(c.map(String::from).unwrap_or_default())
            }

            Builtin::RegexMatches => {
                let s = self.pop_text()?;
                let pattern = self.pop_text()?;
                let found = self.ctx.runtime_mut().patterns.get(&pattern).map(|re| re.is_match(&s));
                match found {
                    Ok(found) => Value::Boolean(found),
                    Err(e) => {
                        self.script_error(e);
                        Value::Boolean(false)
                    }
                }
            }
            Builtin::RegexFind => {
                let s = self.pop_text()?;
                let pattern = self.pop_text()?;
                let found = self
                    .ctx
                    .runtime_mut()
                    .patterns
                    .get(&pattern)
                    .map(|re| re.find(&s).map(|m| m.as_str().to_string()));
                match found {
                    Ok(Some(m)) => Value::String(m),
                    Ok(None) => Value::Boolean(false),
                    Err(e) => {
                        self.script_error(e);
                        Value::Boolean(false)
                    }
                }
            }
            Builtin::RegexFindAll => {
                let s = self.pop_text()?;
                let pattern = self.pop_text()?;
                let found = self.ctx.runtime_mut().patterns.get(&pattern).map(|re| {
                    re.find_iter(&s)
                        .map(|m| Value::string(m.as_str()))
                        .collect::<Vec<_>>()
                });
                let items = found.unwrap_or_else(|e| {
                    self.script_error(e);
                    Vec::new()
                });
                Value::List(self.ctx.heap_mut().list_from(items)?)
            }
            Builtin::RegexReplace => {
                let replacement = self.pop_text()?;
                let s = self.pop_text()?;
                let pattern = self.pop_text()?;
                let replaced = self
                    .ctx
                    .runtime_mut()
                    .patterns
                    .get(&pattern)
                    .map(|re| re.replace_all(&s, replacement.as_str()).into_owned());
                match replaced {
                    Ok(out) => Value::String(out),
                    Err(e) => {
                        self.script_error(e);
                        Value::String(s)
                    }
                }
            }

            Builtin::Min => {
                let b = self.pop()?;
                let a = self.pop()?;
                pick(&a, &b, i64::min, f64::min)
            }
            Builtin::Max => {
                let b = self.pop()?;
                let a = self.pop()?;
                pick(&a, &b, i64::max, f64::max)
            }
            Builtin::Clamp => {
                let high = self.pop()?;
                let low = self.pop()?;
                let value = self.pop()?;
                let raised = pick(&value, &low, i64::max, f64::max);
                pick(&raised, &high, i64::min, f64::min)
            }
            Builtin::Floor => round_with(&self.pop()?, f64::floor),
            Builtin::Ceiling => round_with(&self.pop()?, f64::ceil),
            Builtin::Round => round_with(&self.pop()?, f64::round),
            Builtin::Sqrt => Value::Float(self.pop()?.as_float().sqrt()),
            Builtin::RandomInt => {
                let bound = self.pop()?.as_integer();
                if bound <= 0 {
                    Value::Integer(0)
                } else {
                    Value::Integer(self.ctx.runtime_mut().rng.gen_range(0..bound))
                }
            }
            Builtin::RandomFloat => {
                let bound = self.pop()?.as_float();
                if bound.is_finite() && bound > 0.0 {
                    Value::Float(self.ctx.runtime_mut().rng.gen::<f64>() * bound)
                } else {
                    Value::Float(0.0)
                }
            }
            Builtin::RandomGaussian => {
                let deviation = self.pop()?.as_float();
                let mean = self.pop()?.as_float();
                let rng = &mut self.ctx.runtime_mut().rng;
                // Box-Muller; u1 lies in (0, 1] so the logarithm stays finite.
                let u1 = 1.0 - rng.gen::<f64>();
                let u2 = rng.gen::<f64>();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                Value::Float(mean + deviation * z)
            }

            Builtin::ListAdd => {
                let value = self.pop()?;
                let list = self.pop_list(name)?;
                Value::Boolean(self.ctx.heap_mut().list_add(list, value))
            }
            Builtin::ListAddAt => {
                let value = self.pop()?;
                let index = self.pop()?.as_integer();
                let list = self.pop_list(name)?;
                Value::Boolean(self.ctx.heap_mut().list_add_at(list, index, value))
            }
            Builtin::ListRemove => {
                let value = self.pop()?;
                let list = self.pop_list(name)?;
                Value::Boolean(self.ctx.heap_mut().list_remove(list, &value))
            }
            Builtin::ListRemoveAt => {
                let index = self.pop()?.as_integer();
                let list = self.pop_list(name)?;
                self.ctx
                    .heap_mut()
                    .list_remove_at(list, index)
                    .unwrap_or(Value::Boolean(false))
            }
            Builtin::ListSet => {
                let value = self.pop()?;
                let index = self.pop()?.as_integer();
                let list = self.pop_list(name)?;
                Value::Boolean(self.ctx.heap_mut().list_set(list, index, value))
            }
            Builtin::ListGet => {
                let index = self.pop()?.as_integer();
                let list = self.pop_list(name)?;
                self.ctx
                    .heap()
                    .list_get(list, index)
                    .unwrap_or(Value::Boolean(false))
            }
            Builtin::ListIndexOf => {
                let value = self.pop()?;
                let list = self.pop_list(name)?;
                Value::Integer(self.ctx.heap().list_index_of(list, &value))
            }
            Builtin::ListContains => {
                let value = self.pop()?;
                let list = self.pop_list(name)?;
                Value::Boolean(self.ctx.heap().list_contains(list, &value))
            }
            Builtin::ListCopy => {
                let list = self.pop_list(name)?;
                Value::List(self.ctx.heap_mut().list_copy(list)?)
            }
            Builtin::ListConcat => {
                let second = self.pop_list(name)?;
                let first = self.pop_list(name)?;
                let heap = self.ctx.heap_mut();
                let items: Vec<Value> = heap
                    .items(first)
                    .iter()
                    .chain(heap.items(second))
                    .cloned()
                    .collect();
                Value::List(heap.list_from(items)?)
            }
        };
        self.request.push(result)
    }
}
