//! 文本行协议
//!
//! 每行一个事件：`<verb> <x> <y>`，动作字母为 `p`（按下）、`m`（拖动）、
//! `l`（抬起）、`d`（双击），大小写不敏感；单独的 `c` 关闭连接。
//! 服务端在角色变化时回写 `role <id> <colour>`。
//!
//! ```
//! use gunboat_control::line::{LineCommand, parse_line};
//! use gunboat_protocol::GestureAction;
//!
//! match parse_line("m 0.5 -0.25").unwrap() {
//!     LineCommand::Event(event) => assert_eq!(event.action, GestureAction::Move),
//!     LineCommand::Close => unreachable!(),
//! }
//! ```

use crate::error::ControlError;
use gunboat_protocol::{GestureAction, GestureEvent, Role};

/// 解析后的一行
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineCommand {
    Event(GestureEvent),
    Close,
}

pub fn parse_line(line: &str) -> Result<LineCommand, ControlError> {
    let mut tokens = line.split_whitespace();
    let verb = tokens
        .next()
        .ok_or_else(|| ControlError::Protocol("empty line".to_string()))?;

    let mut chars = verb.chars();
    let letter = match (chars.next(), chars.next()) {
        (Some(letter), None) => letter.to_ascii_lowercase(),
        _ => return Err(ControlError::Protocol(format!("unknown verb: {}", verb))),
    };
    if letter == 'c' {
        return Ok(LineCommand::Close);
    }
    let action = GestureAction::from_verb(letter)
        .ok_or_else(|| ControlError::Protocol(format!("unknown verb: {}", verb)))?;

    let x = parse_coordinate(tokens.next(), line)?;
    let y = parse_coordinate(tokens.next(), line)?;
    if tokens.next().is_some() {
        return Err(ControlError::Protocol(format!("trailing data: {}", line)));
    }
    Ok(LineCommand::Event(GestureEvent::new(action, x, y)))
}

fn parse_coordinate(token: Option<&str>, line: &str) -> Result<f64, ControlError> {
    let token = token.ok_or_else(|| ControlError::Protocol(format!("missing coordinate: {}", line)))?;
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ControlError::Protocol(format!("bad coordinate: {}", token))),
    }
}

pub fn format_event(event: &GestureEvent) -> String {
    format!("{} {} {}", event.action.verb(), event.x, event.y)
}

/// 角色回写行
pub fn format_role(role: Role) -> String {
    format!("role {} {}", role.id(), role.colour())
}

/// 解析角色回写行（客户端侧）
pub fn parse_role(line: &str) -> Option<Role> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "role" {
        return None;
    }
    let id = tokens.next()?.parse::<usize>().ok()?;
    Some(Role::from_id(id))
}
