use jiff::{Span, ToSpan, tz::TimeZone};

use crate::models::task::{NewTask, Recurrence, Status, Task};

/// Next instance of a recurring task that has just been completed.
///
/// Returns `None` when the task was already done before this transition, does not
/// repeat, or has no due date. Monthly steps keep the day of month, clamped to the
/// last day of the target month.
///
/// A priority the store held but this crate does not recognize cannot be written
/// back as-is; the next instance gets the default priority instead.
pub fn next_occurrence(task: &Task, previous_status: Status, tz: &TimeZone) -> Option<NewTask> {
    if previous_status == Status::Done {
        return None;
    }
    let step = step(task.recurrence)?;
    let due = task.due_date?;

    let next_due = match due.to_zoned(tz.clone()).checked_add(step) {
        Ok(next) => next.timestamp(),
        Err(e) => {
            tracing::warn!(id = task.id, error = %e, "could not advance recurring due date");
            return None;
        }
    };

    Some(NewTask {
        title: task.title.clone(),
        description: task.description.clone(),
        due_date: Some(next_due),
        priority: task.priority.unwrap_or_default(),
        status: Status::ToDo,
        project_id: task.project_id,
        tags: task.tags.clone(),
        recurrence: task.recurrence,
        reminder: task.reminder,
    })
}

fn step(recurrence: Recurrence) -> Option<Span> {
    match recurrence {
        Recurrence::None => None,
        Recurrence::Daily => Some(1.day()),
        Recurrence::Weekly => Some(7.days()),
        Recurrence::Monthly => Some(1.month()),
    }
}
