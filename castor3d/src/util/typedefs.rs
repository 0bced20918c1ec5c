/// A string which uses SmallString optimization for strings shorter than 23 characters.
pub type SsoString = smartstring::SmartString<smartstring::LazyCompact>;
/// Hash map designed for small keys.
pub type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;
/// Hash set designed for small keys.
pub type FastHashSet<K> = rustc_hash::FxHashSet<K>;
/// Build hasher used by the fast hash containers.
pub type FastBuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
/// Insertion ordered map using the fast hasher.
pub type FastIndexMap<K, V> = indexmap::IndexMap<K, V, FastBuildHasher>;

#[macro_export]
/// Similar to the [`format`] macro, but creates a [`SsoString`].
macro_rules! format_sso {
    ($($arg:tt)*) => {{
        use std::fmt::Write as _;
        let mut buffer = $crate::util::typedefs::SsoString::new();
        write!(buffer, $($arg)*).expect("unexpected formatting error");
        buffer
    }};
}
