mod integration {
    mod helpers;
    mod schedule_and_cancel_works;
    mod startup_works;
}
