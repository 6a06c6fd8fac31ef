use super::asm::{self, MemSize, Operand, Reg};
use super::{AssignKind, Compiler};
use crate::token::{Line, Token, TokenKind};

/// Routes a macro statement by its leading token.
pub fn handle(c: &mut Compiler, tokens: &[Token]) {
    match tokens[0].text.as_str() {
        "exit!" => exit(c, tokens),
        "negate!" => negate(c, tokens),
        "clamp!" => clamp(c, tokens),
        "repeat!" => repeat(c, tokens),
        "swap!" => swap(c, tokens),
        _ => {}
    }
}

/// `exit!(expr);` terminates the process with the value of `expr`.
fn exit(c: &mut Compiler, tokens: &[Token]) {
    let span = if tokens.len() >= 4 {
        &tokens[2..tokens.len() - 2]
    } else {
        &[]
    };
    c.assign(span, Operand::Reg(Reg::Rcx), MemSize::QWord, AssignKind::Integer);

    asm::code!(c.out, Mov, Reg::Rax, 60);
    asm::code!(c.out, Mov, Reg::Rdi, Reg::Rcx);
    asm::code!(c.out, Syscall);

    c.has_exit = true;
}

/// `negate!(expr, var);` stores the arithmetic negation of `expr` into
/// `var`. Unsigned variables cannot be negated.
fn negate(c: &mut Compiler, tokens: &[Token]) {
    let mut first_param = Vec::new();
    let mut i = 2;
    while i < tokens.len() && !tokens[i].is(",") {
        first_param.push(tokens[i].clone());
        i += 1;
    }

    let Some(var_token) = tokens
        .len()
        .checked_sub(3)
        .and_then(|at| tokens.get(at))
        .filter(|t| t.kind == TokenKind::Identifier)
    else {
        let message = "Expected a variable as the second parameter of 'negate!'";
        c.diags.syntax(c.current_line, message);
        return;
    };
    let Some(var) = c.scope.lookup(&var_token.text).cloned() else {
        let message = format!("There is no variable available called '{}'", var_token.text);
        c.diags.unresolved(c.current_line, message);
        return;
    };
    if var.unsigned {
        let message = "You cannot negate unsigned variables";
        c.diags.semantic(c.current_line, message);
        return;
    }

    let size = var.mem_size();
    c.assign(
        &first_param,
        Operand::Reg(Reg::acc(size)),
        size,
        AssignKind::Unspecified,
    );

    if size == MemSize::Byte {
        // byte multiplies need a 16-bit stage so the -1 factor is defined
        asm::code!(c.out, Movsx, Reg::Ax, Reg::Al);
        asm::code!(c.out, Imul, Reg::Ax, -1);
    } else {
        asm::code!(c.out, Imul, Reg::acc(size), -1);
    }
    asm::code!(c.out, Mov, var.mem(), Reg::acc(size));
}

/// `clamp!(var, min, max);` raises `var` to `min`, then lowers it to `max`.
/// Max is enforced after min, so a max below min yields max.
fn clamp(c: &mut Compiler, tokens: &[Token]) {
    let mut var = None;
    let mut min_value = Vec::new();
    let mut max_value = Vec::new();

    let mut parameter = 0;
    let mut depth = 1;
    let mut i = 2;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.is(",") {
            parameter += 1;
            i += 1;
            continue;
        } else if token.is("(") {
            depth += 1;
        } else if token.is(")") {
            depth -= 1;
            if depth == 0 {
                break;
            }
        }

        match parameter {
            0 => {
                if var.is_none() {
                    let Some(found) = c.scope.lookup(&token.text).cloned() else {
                        let message =
                            format!("There is no variable available called '{}'", token.text);
                        c.diags.unresolved(c.current_line, message);
                        return;
                    };
                    var = Some(found);
                } else {
                    let message = "The first parameter of 'clamp!' must be a reference";
                    c.diags.semantic(c.current_line, message);
                    return;
                }
            }
            1 => min_value.push(token.clone()),
            _ => max_value.push(token.clone()),
        }
        i += 1;
    }

    let Some(var) = var else {
        let message = "The first parameter of 'clamp!' must be a reference";
        c.diags.semantic(c.current_line, message);
        return;
    };

    let size = var.mem_size();
    let acc = Reg::acc(size);
    let bse = Reg::bse(size);
    let cnt = Reg::cnt(size);

    c.assign(&min_value, Operand::Reg(cnt), size, AssignKind::Unspecified);
    asm::code!(c.out, Mov, acc, var.mem());
    asm::code!(c.out, Cmp, acc, cnt);
    asm::code!(c.out, Mov, bse, cnt);
    asm::code!(c.out, "  cmovl {acc}, {bse}");

    c.assign(&max_value, Operand::Reg(cnt), size, AssignKind::Unspecified);
    asm::code!(c.out, Cmp, acc, cnt);
    asm::code!(c.out, Mov, bse, cnt);
    asm::code!(c.out, "  cmovg {acc}, {bse}");

    asm::code!(c.out, Mov, var.mem(), acc);
}

/// `repeat!(count, { body });` lowers to a down-counting loop. The counter
/// is tested only after the decrement, so the body always runs at least
/// once, even for a zero or negative count.
fn repeat(c: &mut Compiler, tokens: &[Token]) {
    let mut count = Vec::new();
    let mut body: Vec<Line> = Vec::new();
    let mut statement = Line::new();
    let mut in_body = false;
    let mut body_closed = false;

    let mut depth = 1;
    let mut i = 2;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.is("(") {
            depth += 1;
        } else if token.is(")") {
            depth -= 1;
            if depth == 0 {
                break;
            }
        }

        if !in_body {
            if token.is(",") && depth == 1 {
                in_body = true;
                i += 1;
                if !tokens.get(i).is_some_and(|t| t.is("{")) {
                    let message = "The expression has to start with a '{'";
                    c.diags.syntax(c.current_line, message);
                    return;
                }
            } else {
                count.push(token.clone());
            }
        } else if token.is("}") && depth == 1 {
            body_closed = true;
            if !statement.is_empty() {
                body.push(std::mem::take(&mut statement));
            }
        } else {
            statement.push(token.clone());
            if token.kind == TokenKind::Semicolon {
                body.push(std::mem::take(&mut statement));
            }
        }
        i += 1;
    }

    if !in_body {
        let message = "The expression has to start with a '{'";
        c.diags.syntax(c.current_line, message);
        return;
    }
    if !body_closed {
        let message = "The expression has to end with a '}'";
        c.diags.syntax(c.current_line, message);
        return;
    }

    c.assign(
        &count,
        Operand::Reg(Reg::R8),
        MemSize::QWord,
        AssignKind::Integer,
    );

    let label = format!("REPEAT{}", c.labels);
    c.labels += 1;
    asm::code!(c.out, "{label}:");

    for statement in &body {
        c.dispatch(statement);
    }

    asm::code!(c.out, Dec, Reg::R8);
    asm::code!(c.out, Jnz, label);
}

/// `swap!(a, b);` exchanges two same-size variables.
fn swap(c: &mut Compiler, tokens: &[Token]) {
    let mut first = None;
    let mut second = None;

    let mut parameter = 0;
    for token in tokens.iter().take(tokens.len().saturating_sub(2)).skip(2) {
        if token.is(",") {
            parameter += 1;
            continue;
        }
        if token.kind == TokenKind::Identifier {
            let Some(var) = c.scope.lookup(&token.text).cloned() else {
                let message = format!("There is no variable available called '{}'", token.text);
                c.diags.unresolved(c.current_line, message);
                return;
            };
            if parameter == 0 {
                first = Some(var);
            } else {
                second = Some(var);
            }
        }
    }

    let (Some(a), Some(b)) = (first, second) else {
        let message = "Expected two variables inside 'swap!'";
        c.diags.syntax(c.current_line, message);
        return;
    };
    if a.size != b.size {
        let message = format!(
            "The variable '{}' has to have the same type size as the variable '{}'",
            a.name, b.name
        );
        c.diags.semantic(c.current_line, message);
        return;
    }

    let acc = Reg::acc(a.mem_size());
    let bse = Reg::bse(b.mem_size());
    asm::code!(c.out, Mov, acc, a.mem());
    asm::code!(c.out, Mov, bse, b.mem());
    asm::code!(c.out, Xchg, acc, bse);
    asm::code!(c.out, Mov, a.mem(), acc);
    asm::code!(c.out, Mov, b.mem(), bse);
}
