use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Convert a borrowed value into one that owns all of its data.
///
/// Most twill types borrow from their input where they can. When a value has
/// to outlive that input (stored in a session, sent across threads), call
/// [`IntoStatic::into_static`] to launder the lifetime by copying only the
/// still-borrowed parts.
pub trait IntoStatic {
    /// The `'static` form of the implementing type.
    type Output: 'static;

    /// Take ownership of all borrowed data.
    fn into_static(self) -> Self::Output;
}

impl<T: IntoStatic> IntoStatic for Option<T> {
    type Output = Option<T::Output>;

    fn into_static(self) -> Self::Output {
        self.map(IntoStatic::into_static)
    }
}

impl<T: IntoStatic> IntoStatic for Vec<T> {
    type Output = Vec<T::Output>;

    fn into_static(self) -> Self::Output {
        self.into_iter().map(IntoStatic::into_static).collect()
    }
}

impl<T: IntoStatic> IntoStatic for Box<T> {
    type Output = Box<T::Output>;

    fn into_static(self) -> Self::Output {
        Box::new((*self).into_static())
    }
}

impl<V: IntoStatic> IntoStatic for BTreeMap<SmolStr, V> {
    type Output = BTreeMap<SmolStr, V::Output>;

    fn into_static(self) -> Self::Output {
        self.into_iter()
            .map(|(k, v)| (k, v.into_static()))
            .collect()
    }
}

macro_rules! impl_into_static_identity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoStatic for $ty {
                type Output = $ty;

                #[inline]
                fn into_static(self) -> Self::Output {
                    self
                }
            }
        )*
    };
}

impl_into_static_identity!(
    (),
    bool,
    u8,
    u16,
    u32,
    u64,
    usize,
    i8,
    i16,
    i32,
    i64,
    isize,
    f32,
    f64,
    String,
    SmolStr,
    bytes::Bytes,
    serde_json::Value,
);
