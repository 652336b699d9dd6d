//! 预设问题

/// 一个预设问题（按钮标题 + 问题内容）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub title: &'static str,
    pub content: &'static str,
}

pub const PRESETS: [Preset; 5] = [
    Preset {
        title: "Plaintiff Position",
        content: "What is the plaintiff's position",
    },
    Preset {
        title: "Defendant Position",
        content: "What is the defendant's position?",
    },
    Preset {
        title: "Case Summary",
        content: "Give me a summary of the case.",
    },
    Preset {
        title: "Party Demands",
        content: "What do the parties demand?",
    },
    Preset {
        title: "Case Participants",
        content: "Who are the case Participants?",
    },
];

/// 按下标取预设问题
pub fn preset(index: usize) -> Option<&'static Preset> {
    PRESETS.get(index)
}
