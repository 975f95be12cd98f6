//! 手势事件与连接角色
//!
//! 任意传输层（蓝牙摇杆、TCP 行协议、进程内通道）都解码为同一组抽象动作，
//! 控制器只按连接编号路由这些动作。

/// 抽象手势动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureAction {
    /// 按下
    Press,
    /// 拖动
    Move,
    /// 抬起
    Lift,
    /// 双击（角色切换）
    Double,
}

impl GestureAction {
    /// 行协议中的动作字母
    pub fn verb(self) -> char {
        match self {
            GestureAction::Press => 'p',
            GestureAction::Move => 'm',
            GestureAction::Lift => 'l',
            GestureAction::Double => 'd',
        }
    }

    /// 从行协议动作字母解析
    pub fn from_verb(verb: char) -> Option<Self> {
        match verb {
            'p' => Some(GestureAction::Press),
            'm' => Some(GestureAction::Move),
            'l' => Some(GestureAction::Lift),
            'd' => Some(GestureAction::Double),
            _ => None,
        }
    }
}

/// 一次手势事件
///
/// `x`、`y` 已归一化到 `[-1, 1]`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvent {
    pub action: GestureAction,
    pub x: f64,
    pub y: f64,
}

impl GestureEvent {
    /// 创建事件，坐标被截断到 `[-1, 1]`
    pub fn new(action: GestureAction, x: f64, y: f64) -> Self {
        Self {
            action,
            x: x.clamp(-1.0, 1.0),
            y: y.clamp(-1.0, 1.0),
        }
    }
}

/// 连接角色
///
/// 由连接编号决定：0 为导航，≥ 1 为瞄准通道。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Navigate,
    Target(usize),
}

/// 角色指示颜色（按连接编号取模）
const ROLE_COLOURS: [&str; 4] = ["green", "red", "orange", "yellow"];

impl Role {
    pub fn from_id(id: usize) -> Self {
        if id == 0 {
            Role::Navigate
        } else {
            Role::Target(id)
        }
    }

    pub fn id(self) -> usize {
        match self {
            Role::Navigate => 0,
            Role::Target(id) => id,
        }
    }

    /// 设备端用于指示角色的颜色名
    pub fn colour(self) -> &'static str {
        ROLE_COLOURS[self.id() % ROLE_COLOURS.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_mapping() {
        for action in [
            GestureAction::Press,
            GestureAction::Move,
            GestureAction::Lift,
            GestureAction::Double,
        ] {
            assert_eq!(GestureAction::from_verb(action.verb()), Some(action));
        }
        assert_eq!(GestureAction::from_verb('c'), None);
        assert_eq!(GestureAction::from_verb('x'), None);
    }

    #[test]
    fn test_event_coordinates_are_clamped() {
        let event = GestureEvent::new(GestureAction::Move, 1.7, -3.0);
        assert_eq!(event.x, 1.0);
        assert_eq!(event.y, -1.0);
    }

    #[test]
    fn test_role_colours() {
        assert_eq!(Role::from_id(0), Role::Navigate);
        assert_eq!(Role::from_id(0).colour(), "green");
        assert_eq!(Role::from_id(1).colour(), "red");
        assert_eq!(Role::from_id(3).colour(), "yellow");
        assert_eq!(Role::from_id(4).colour(), "green");
        assert_eq!(Role::Target(2).id(), 2);
    }
}
