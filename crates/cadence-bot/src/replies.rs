//! Reply text rendering.
//!
//! Denials are short corrective messages, never logged as system errors.
//! Errors with no denial mapping are the dispatcher's problem (logged and
//! dropped).

use cadence_core::types::{ParticipantStats, Period, SignupSummary, TARGET_CHECKINS};
use cadence_core::CadenceError;

pub const ROUND_OPENED: &str = "本期接龙已开启，请大家踊跃报名！";

pub const CHECKIN_USAGE: &str =
    "📝 打卡格式不正确\n正确格式：#打卡 昵称 工作内容\n示例：#打卡 张三 完成了登录功能的开发";

/// The corrective chat message for a user-facing denial, if this error is
/// one.
pub fn denial_text(err: &CadenceError) -> Option<String> {
    let text = match err {
        CadenceError::RoundAlreadyOpen { name, status } => {
            format!("接龙失败：当前已有活动在进行中（{name}，状态：{status}）")
        }
        CadenceError::NoOpenPeriod => "接龙结束失败：没有正在进行的接龙活动".to_string(),
        CadenceError::NoSignupLink => "接龙结束失败：未找到接龙链接".to_string(),
        CadenceError::EmptyImport | CadenceError::FetchFailed(_) => {
            "接龙结束失败：未获取到有效的报名数据".to_string()
        }
        CadenceError::DuplicateNickname(nickname) => {
            format!("接龙结束失败：报名表中昵称 {nickname} 重复，请修正后重试")
        }
        CadenceError::NoActivePeriod => {
            "⚠️ 当前没有进行中的活动期数，请等待新的活动开始".to_string()
        }
        CadenceError::UnknownParticipant(nickname) => {
            format!("⚠️ 未找到昵称为 {nickname} 的报名记录\n请先完成接龙或检查昵称是否正确")
        }
        CadenceError::CheckinExistsToday => "⚠️ 您今天已经打过卡了，明天再来吧！".to_string(),
        CadenceError::ContentTooShort => "📝 打卡内容太短，请详细描述您的工作内容".to_string(),
        CadenceError::ContentTooLong => "📝 打卡内容过长，请控制在500字以内".to_string(),
        _ => return None,
    };
    Some(text)
}

/// End-of-signup summary, grouped by focus area.
pub fn signup_summary(summary: &SignupSummary) -> String {
    let mut lines = vec![
        "✨ 本期接龙结束，祝大家开发旅途愉快！\n".to_string(),
        format!("📊 {}期接龙数据汇总", summary.period_name),
        format!("总参与人数：{}人\n", summary.total),
        "🌟 参与者名单：".to_string(),
    ];
    for (focus_area, nicknames) in &summary.by_focus_area {
        lines.push(format!("\n{focus_area}："));
        for nickname in nicknames {
            lines.push(format!("- {nickname}"));
        }
    }
    lines.push("\n\n祝愿大家在本期活动中收获满满！🎉".to_string());
    lines.join("\n")
}

/// End-of-round summary with per-participant counts and qualification.
pub fn close_summary(period: &Period, stats: &[ParticipantStats]) -> String {
    let mut lines = vec![
        format!("✨ {}期活动圆满结束！", period.name),
        "感谢大家的积极参与和付出！\n".to_string(),
        "📊 本期打卡统计：".to_string(),
    ];
    for s in stats {
        let mark = if s.qualified { "✅ 达标" } else { "" };
        lines.push(format!(
            "- {}（{}）：{}/{} 次 {}",
            s.nickname, s.focus_area, s.checkin_count, TARGET_CHECKINS, mark
        ));
    }
    lines.push("\n期待下次活动再见！🌟".to_string());
    lines.join("\n")
}
