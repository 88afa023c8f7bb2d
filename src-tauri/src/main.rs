#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    fittner_shell::shell::run();
}
