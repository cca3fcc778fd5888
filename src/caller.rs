use crate::error::FormatError;
use crate::record::Level;
use crate::skip_cache::SkipCache;
use std::sync::Arc;

/// Upper bound on the number of frames examined per walk. If the walk
/// has not left framework code within this window, resolution fails.
pub const MAX_FRAMES: usize = 20;

/// Function-name prefix that identifies logging front-end frames. The
/// string prefix `tracing` also covers `tracing_core` and
/// `tracing_subscriber`.
pub const DEFAULT_FRAMEWORK_PREFIX: &str = "tracing";

/// One resolved activation record of the call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Fully-qualified function name, demangled.
    pub function: String,
    pub file: String,
    pub line: u32,
}

/// Capability that captures a window of resolved caller frames.
///
/// **Returns**
/// - Up to [`MAX_FRAMES`] frames, ordered innermost first, beginning at
///   the anchor: the first frame *outside* this crate's own code and
///   the capture machinery. Skip depths are measured against this
///   anchor, so every implementation must strip its own leading frames.
///
/// The default implementation is [`RuntimeWalker`]; tests substitute
/// scripted walkers to pin down depths deterministically.
pub trait StackWalker: Send + Sync {
    fn capture(&self) -> Vec<Frame>;
}

/// [`StackWalker`] backed by the `backtrace` crate.
#[derive(Debug, Default)]
pub struct RuntimeWalker;

impl StackWalker for RuntimeWalker {
    fn capture(&self) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(MAX_FRAMES);
        let mut in_prelude = true;
        backtrace::trace(|raw| {
            let mut resolved: Option<Frame> = None;
            backtrace::resolve_frame(raw, |symbol| {
                if resolved.is_some() {
                    return;
                }
                if let Some(name) = symbol.name() {
                    resolved = Some(Frame {
                        function: format!("{:#}", name),
                        file: symbol
                            .filename()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default(),
                        line: symbol.lineno().unwrap_or(0),
                    });
                }
            });
            let frame = match resolved {
                Some(frame) => frame,
                // Unresolvable frame; keep walking.
                None => return true,
            };
            if in_prelude {
                if is_internal(&frame.function) {
                    return true;
                }
                in_prelude = false;
            }
            frames.push(frame);
            frames.len() < MAX_FRAMES
        });
        frames
    }
}

/// Leading frames belonging to the capture machinery or to this crate
/// itself; they sit between the raw trace start and the anchor.
fn is_internal(function: &str) -> bool {
    let name = function.strip_prefix('<').unwrap_or(function);
    name.starts_with("backtrace") || name.starts_with("gcp_log_format")
}

/// Computes and caches, per level, how many frames of the capture
/// window belong to the logging front-end.
///
/// The front-end inserts a different number of wrapper frames per
/// severity helper, so the depth is stable for a given level but must
/// be resolved independently for each. Resolution happens at most once
/// per level; afterwards [`CallerResolver::skip_depth`] is a cache
/// read with no stack walk.
pub struct CallerResolver {
    walker: Arc<dyn StackWalker>,
    framework_prefixes: Vec<String>,
    cache: SkipCache,
}

impl Default for CallerResolver {
    fn default() -> Self {
        Self::new(
            Arc::new(RuntimeWalker),
            vec![DEFAULT_FRAMEWORK_PREFIX.to_string()],
        )
    }
}

impl CallerResolver {
    /// Build a resolver over an explicit walker and framework-name
    /// prefixes. The skip cache starts empty and is owned by the
    /// resolver; nothing here is process-global.
    pub fn new(walker: Arc<dyn StackWalker>, framework_prefixes: Vec<String>) -> Self {
        Self {
            walker,
            framework_prefixes,
            cache: SkipCache::new(),
        }
    }

    /// Skip depth for `level`: the 1-based index, within the capture
    /// window, of the first frame that is not framework code.
    ///
    /// **Returns**
    /// - `Ok(depth)` from the cache, or freshly computed and stored on
    ///   first use of the level.
    /// - `Err(FormatError::SkipNotFound)` if the whole window is
    ///   framework code; nothing is cached and the next call retries.
    pub fn skip_depth(&self, level: Level) -> Result<usize, FormatError> {
        self.cache.get_or_try_insert_with(level, || {
            let frames = self.walker.capture();
            self.find_skip(level, &frames)
        })
    }

    fn find_skip(&self, level: Level, frames: &[Frame]) -> Result<usize, FormatError> {
        for (index, frame) in frames.iter().enumerate() {
            if self.is_framework_frame(frame) {
                continue;
            }
            return Ok(index + 1);
        }
        Err(FormatError::SkipNotFound(level))
    }

    /// Trait-impl symbols demangle as `<path as path>::method`, so the
    /// leading `<` is stripped before the prefix comparison.
    pub fn is_framework_frame(&self, frame: &Frame) -> bool {
        let name = frame.function.strip_prefix('<').unwrap_or(&frame.function);
        self.framework_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Resolve the frame a previously computed skip depth points at.
    /// `None` when the current stack is shallower than the depth; the
    /// formatter omits source attribution in that case.
    pub fn caller_at(&self, depth: usize) -> Option<Frame> {
        if depth == 0 {
            return None;
        }
        let mut frames = self.walker.capture();
        if depth <= frames.len() {
            Some(frames.swap_remove(depth - 1))
        } else {
            None
        }
    }

    /// Cached depth for `level`, if one has been resolved.
    pub fn cached_depth(&self, level: Level) -> Option<usize> {
        self.cache.lookup(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Walker returning a scripted window and counting captures.
    struct ScriptedWalker {
        frames: Vec<Frame>,
        captures: AtomicUsize,
    }

    impl ScriptedWalker {
        fn new(frames: Vec<Frame>) -> Self {
            Self {
                frames,
                captures: AtomicUsize::new(0),
            }
        }

        fn captures(&self) -> usize {
            self.captures.load(Ordering::SeqCst)
        }
    }

    impl StackWalker for ScriptedWalker {
        fn capture(&self) -> Vec<Frame> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            self.frames.clone()
        }
    }

    fn frame(function: &str) -> Frame {
        Frame {
            function: function.to_string(),
            file: format!("src/{}.rs", function.replace("::", "_")),
            line: 42,
        }
    }

    fn scripted(names: &[&str]) -> Arc<ScriptedWalker> {
        Arc::new(ScriptedWalker::new(names.iter().map(|n| frame(n)).collect()))
    }

    fn resolver(walker: Arc<ScriptedWalker>) -> CallerResolver {
        CallerResolver::new(walker, vec![DEFAULT_FRAMEWORK_PREFIX.to_string()])
    }

    #[test]
    fn depth_is_first_non_framework_index_plus_one() {
        let walker = scripted(&[
            "tracing::event",
            "<tracing_subscriber::layer::Layered<L, S> as tracing_core::subscriber::Subscriber>::event",
            "tracing_core::dispatcher::dispatch",
            "myapp::handler::run",
            "myapp::main",
        ]);
        let resolver = resolver(Arc::clone(&walker));

        assert_eq!(resolver.skip_depth(Level::Error).unwrap(), 4);
        assert_eq!(resolver.cached_depth(Level::Error), Some(4));
    }

    #[test]
    fn second_lookup_hits_cache_without_walking() {
        let walker = scripted(&["tracing::event", "myapp::main"]);
        let resolver = resolver(Arc::clone(&walker));

        assert_eq!(resolver.skip_depth(Level::Info).unwrap(), 2);
        let walks_after_first = walker.captures();
        assert_eq!(resolver.skip_depth(Level::Info).unwrap(), 2);
        assert_eq!(walker.captures(), walks_after_first);
    }

    #[test]
    fn depths_are_resolved_per_level() {
        let walker = scripted(&["tracing::event", "myapp::main"]);
        let resolver = resolver(Arc::clone(&walker));

        resolver.skip_depth(Level::Info).unwrap();
        assert_eq!(walker.captures(), 1);
        resolver.skip_depth(Level::Warn).unwrap();
        assert_eq!(walker.captures(), 2);
    }

    #[test]
    fn window_full_of_framework_frames_is_an_error() {
        let names: Vec<String> = (0..MAX_FRAMES).map(|i| format!("tracing::wrap{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let walker = scripted(&refs);
        let resolver = resolver(Arc::clone(&walker));

        let err = resolver.skip_depth(Level::Error).unwrap_err();
        assert!(matches!(err, FormatError::SkipNotFound(Level::Error)));
        assert_eq!(resolver.cached_depth(Level::Error), None);
    }

    #[test]
    fn caller_at_selects_frame_by_depth() {
        let walker = scripted(&["tracing::event", "myapp::handler::run", "myapp::main"]);
        let resolver = resolver(Arc::clone(&walker));

        let frame = resolver.caller_at(2).unwrap();
        assert_eq!(frame.function, "myapp::handler::run");
        assert_eq!(resolver.caller_at(0), None);
        assert_eq!(resolver.caller_at(10), None);
    }
}
