//! Reminder - lifecycle タスクが送るリマインド文面

use super::fine::LoanAssessment;
use super::loan::LoanRecord;

/// Compose the periodic reminder for `loan`.
///
/// Overdue loans report days overdue and the current fine, everything else
/// reports the days remaining.
pub fn compose_reminder(loan: &LoanRecord, assessment: &LoanAssessment) -> String {
    let mut msg = format!(
        "Reminder: you borrowed '{}' on {}. ",
        loan.item_id,
        loan.borrowed_at.date_naive()
    );

    if assessment.is_overdue() {
        msg.push_str(&format!(
            "It was due {} day(s) ago. Your fine is {}. Please return it as soon as possible.",
            assessment.overdue_days, assessment.fine
        ));
    } else if assessment.days_left == 0 {
        msg.push_str("It is due today. Please return it.");
    } else {
        msg.push_str(&format!(
            "Please return it within {} day(s).",
            assessment.days_left
        ));
    }
    msg
}
