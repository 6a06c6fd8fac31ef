use super::asm::{self, MemSize, Operand, Reg};
use super::Compiler;
use crate::token::{Token, TokenKind};

/// Outcome of lowering an arithmetic token sequence.
pub enum Eval {
    /// Instructions were emitted; the result sits in the returned register
    /// (the accumulator sized for the requested width).
    Done(Reg),
    /// The sequence is not a pure arithmetic expression (a call appears in
    /// it). Nothing was reported; the caller falls through to function-call
    /// resolution.
    NotArithmetic,
    /// A diagnostic was recorded; the caller gives up on the statement.
    Failed,
}

fn precedence(op: char) -> i32 {
    match op {
        '+' | '-' => 1,
        '*' | '/' => 2,
        _ => 0,
    }
}

// Deletes parenthesis pairs that directly follow a `+`, where the grouping
// cannot change the result. A narrow normalization, not a simplifier.
fn strip_additive_parens(tokens: &mut Vec<Token>) {
    let mut j = 1;
    while j < tokens.len() {
        if tokens[j].is("(") && tokens[j - 1].is("+") {
            let mut depth = 1;
            let mut k = j + 1;
            while k < tokens.len() {
                if tokens[k].is("(") {
                    depth += 1;
                } else if tokens[k].is(")") {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                k += 1;
            }
            if k < tokens.len() {
                tokens.remove(k);
                tokens.remove(j);
                continue;
            }
        }
        j += 1;
    }
}

/// Two-stack precedence evaluation over a flat token sequence. Leaves the
/// result in the accumulator for `size` and returns that register.
pub fn evaluate(c: &mut Compiler, tokens: &[Token], size: MemSize) -> Eval {
    let mut tokens = tokens.to_vec();
    strip_additive_parens(&mut tokens);

    let mut values: Vec<Operand> = Vec::new();
    let mut operators: Vec<char> = Vec::new();
    let mut first_operation = true;

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        match token.kind {
            TokenKind::Parenthesis => {
                if token.is("(") {
                    operators.push('(');
                } else {
                    while operators.last().is_some_and(|op| *op != '(') {
                        reduce(c, &mut values, &mut operators, size, &mut first_operation);
                    }
                    operators.pop();
                }
            }
            TokenKind::Numeric => match token.text.parse::<i64>() {
                Ok(value) => values.push(Operand::Imm(value)),
                Err(_) => {
                    let message = format!("The literal '{}' is not a valid number", token.text);
                    c.diags.syntax(c.current_line, message);
                    return Eval::Failed;
                }
            },
            TokenKind::Identifier => {
                if tokens.get(i + 1).is_some_and(|next| next.is("(")) {
                    // a call; the statement dispatcher resolves those
                    return Eval::NotArithmetic;
                }
                let Some(var) = c.scope.lookup(&token.text) else {
                    let message =
                        format!("There is no variable available called '{}'", token.text);
                    c.diags.unresolved(c.current_line, message);
                    return Eval::Failed;
                };
                values.push(Operand::Mem(var.mem().with_size(size)));
            }
            TokenKind::Keyword => {
                let message = "You cannot use keywords in mathematic operations";
                c.diags.semantic(c.current_line, message);
                return Eval::Failed;
            }
            TokenKind::Operator => {
                let op = token.text.chars().next().unwrap_or(' ');
                while operators
                    .last()
                    .is_some_and(|top| precedence(*top) > precedence(op))
                {
                    reduce(c, &mut values, &mut operators, size, &mut first_operation);
                }
                operators.push(op);
            }
            _ => {}
        }
        i += 1;
    }

    while !operators.is_empty() {
        reduce(c, &mut values, &mut operators, size, &mut first_operation);
    }

    Eval::Done(Reg::acc(size))
}

// Pops one operator and two operands, primes the grade-1/grade-2 registers
// and emits the operation. After the first reduction the accumulator holds
// the running result, so only the operand not already in a register is
// reloaded.
fn reduce(
    c: &mut Compiler,
    values: &mut Vec<Operand>,
    operators: &mut Vec<char>,
    size: MemSize,
    first_operation: &mut bool,
) {
    let Some(op) = operators.pop() else { return };
    if op == '(' {
        return;
    }
    let (Some(second), Some(first)) = (values.pop(), values.pop()) else {
        return;
    };

    let acc = Reg::acc(size);
    let bse = Reg::bse(size);
    let cnt = Reg::cnt(size);

    if *first_operation {
        asm::code!(c.out, Mov, acc, first);
        asm::code!(c.out, Mov, bse, second);
    } else {
        let first_in_register = matches!(
            first,
            Operand::Reg(reg) if reg == acc || reg == bse || reg == cnt
        );
        if first_in_register {
            asm::code!(c.out, Mov, bse, second);
        } else {
            asm::code!(c.out, Mov, bse, first);
        }
    }

    match op {
        '+' => asm::code!(c.out, Add, acc, bse),
        '-' => asm::code!(c.out, Sub, acc, bse),
        '*' => {
            if size == MemSize::Byte {
                // widening one-operand form at byte width
                asm::code!(c.out, Mul, bse);
            } else {
                asm::code!(c.out, Imul, acc, bse);
            }
        }
        _ => {} // '/' takes part in precedence but has no lowering
    }

    *first_operation = false;
    values.push(Operand::Reg(acc));
}
