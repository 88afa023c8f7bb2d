#[cfg(desktop)]
use tauri::image::Image;
use tauri::{AppHandle, Manager, Runtime, WebviewWindow, WindowEvent};

use crate::MAIN_WINDOW_LABEL;

pub(crate) fn show_main_window<R: Runtime>(app: &AppHandle<R>) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        let _ = window.show();
        #[cfg(desktop)]
        {
            let _ = window.unminimize();
        }
        let _ = window.set_focus();
    }
}

#[cfg(desktop)]
pub(crate) fn toggle_main_window<R: Runtime>(app: &AppHandle<R>) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        if window.is_visible().unwrap_or(false) {
            let _ = window.hide();
        } else {
            show_main_window(app);
        }
    }
}

/// Default back behavior at the history root: hide on desktop, leave the app on mobile.
#[cfg(desktop)]
pub(crate) fn leave_main_window<R: Runtime>(window: &WebviewWindow<R>) -> Result<(), String> {
    window
        .hide()
        .map_err(|error| format!("Failed to hide window: {error}"))
}

#[cfg(mobile)]
pub(crate) fn leave_main_window<R: Runtime>(window: &WebviewWindow<R>) -> Result<(), String> {
    window.app_handle().exit(0);
    Ok(())
}

pub(crate) fn handle_window_event<R: Runtime>(window: &tauri::Window<R>, event: &WindowEvent) {
    if window.label() != MAIN_WINDOW_LABEL {
        return;
    }
    if let WindowEvent::CloseRequested { api, .. } = event {
        api.prevent_close();
        let _ = window.hide();
    }
}

#[cfg(desktop)]
pub(crate) fn tray_icon() -> Option<Image<'static>> {
    Image::from_bytes(include_bytes!("../icons/icon.png"))
        .ok()
        .map(|icon| icon.to_owned())
}
