//! Script fragments that carry the registration token into the rendered page.
//!
//! The setup fragment is registered as a document-start script and runs again
//! after every content load. It defines
//! `window.onNativeFcmToken(token)` as a rebroadcast of the `fcm-token`
//! `CustomEvent` (`event.detail.token`). Pages either listen for that event or
//! define the receiver themselves; a receiver the page already installed is
//! left in place. Delivery is fire-and-forget: nothing acknowledges
//! receipt, so the host re-sends after each load.

use serde_json::Value;

use crate::{NATIVE_TOKEN_EVENT, NATIVE_TOKEN_RECEIVER, VIEWPORT_CONTENT};

fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

pub fn setup_script() -> String {
    let receiver = js_string(NATIVE_TOKEN_RECEIVER);
    let event = js_string(NATIVE_TOKEN_EVENT);
    let viewport = js_string(VIEWPORT_CONTENT);
    format!(
        r#"(function () {{
  if (typeof window[{receiver}] !== 'function') {{
    window[{receiver}] = function (token) {{
      window.dispatchEvent(new CustomEvent({event}, {{ detail: {{ token: token }} }}));
    }};
  }}
  if (!document.querySelector('meta[name="viewport"]')) {{
    var head = document.head || document.getElementsByTagName('head')[0] || document.documentElement;
    if (head) {{
      var meta = document.createElement('meta');
      meta.setAttribute('name', 'viewport');
      meta.setAttribute('content', {viewport});
      head.appendChild(meta);
    }}
  }}
}})();
true;"#
    )
}

/// Setup fragment for document start, limited to pages on `origin` so other
/// sites opened in the view never see the receiver.
pub fn document_start_script(origin: &str) -> String {
    format!(
        "if (window.location.origin === {}) {{\n{}\n}}",
        js_string(origin),
        setup_script()
    )
}

/// `None` for an absent token: there is nothing to deliver.
pub fn delivery_script(token: Option<&str>) -> Option<String> {
    let token = token?;
    Some(format!(
        "window.{NATIVE_TOKEN_RECEIVER} && window.{NATIVE_TOKEN_RECEIVER}({}); true;",
        js_string(token)
    ))
}
