//! Hash containers with a fixed `foldhash` state.
//!
//! Every lookup table of the binding model (type handles, qualified names,
//! dispatch tables) is built once and read many times, so a fast fixed-seed
//! hasher is preferred over `RandomState`.

use core::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};

// -----------------------------------------------------------------------------
// FixedHashState

/// A fixed hash seed.
const FIXED_HASH_STATE: FixedState = FixedState::with_seed(0x2D35_8DCC_AA6C_78A5);

/// A fixed hasher, hash results only depend on the input.
pub type FixedHasher = FoldHasher<'static>;

/// Fixed hash state based on `foldhash` with a constant seed.
///
/// # Examples
///
/// ```
/// use core::hash::BuildHasher;
/// use vc_bind::hash::FixedHashState;
///
/// let a = FixedHashState.hash_one("bookstore");
/// let b = FixedHashState.hash_one("bookstore");
/// assert_eq!(a, b);
/// ```
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHashState;

impl BuildHasher for FixedHashState {
    type Hasher = FixedHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        FIXED_HASH_STATE.build_hasher()
    }
}

// -----------------------------------------------------------------------------
// Containers

/// A [`hashbrown::HashMap`] using [`FixedHashState`].
pub type HashMap<K, V> = hashbrown::HashMap<K, V, FixedHashState>;

/// A [`hashbrown::HashSet`] using [`FixedHashState`].
pub type HashSet<T> = hashbrown::HashSet<T, FixedHashState>;
