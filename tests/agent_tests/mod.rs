mod dialog_test;
mod property_test;
mod scenario_test;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use futures::{stream, StreamExt};
use kotoba::{CompletionProvider, FnProvider, ScriptedProvider};

pub fn chat_stub(reply: &str) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::chat("stub").with_default_reply(reply))
}

/// Chat provider answering `<prefix>-1`, `<prefix>-2`, ... in call order.
pub fn counting_provider(prefix: &'static str) -> Arc<dyn CompletionProvider> {
    let count = Arc::new(AtomicUsize::new(0));
    Arc::new(FnProvider::new(prefix, true, move |_| {
        let n = count.fetch_add(1, Ordering::SeqCst) + 1;
        stream::once(async move { Ok((0, format!("{}-{}", prefix, n))) }).boxed()
    }))
}
