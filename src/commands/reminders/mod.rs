mod edit;
mod forget;
mod reminder_list;
mod remindme;
mod reschedule;
mod util;

pub fn commands() -> [crate::Command; 5] {
    [
        remindme::remindme(),
        reminder_list::reminder_list(),
        forget::forget(),
        reschedule::reschedule(),
        edit::edit(),
    ]
}
