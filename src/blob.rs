//! The `xtensa_config` record exported by every variant library.
//!
//! The layout must match the C definition field for field: a leading
//! `config_size` word written by the producer, then one `unsigned int` per
//! hardware option in a fixed order. New fields are only ever appended, which
//! is what makes the size check in [`check_config_size`] meaningful.

use std::ffi::{c_uint, c_ulong};
use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::LoadError;

macro_rules! xtensa_config_layout {
    ($($field:ident => $define:literal = $default:expr,)+) => {
        /// Target-specific core configuration, as laid out by the C toolchain.
        #[repr(C)]
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct XtensaConfig {
            /// `sizeof (struct xtensa_config)` as compiled into the producer.
            pub config_size: c_ulong,
            $(
                #[doc = concat!("`", $define, "`")]
                pub $field: c_uint,
            )+
        }

        impl XtensaConfig {
            /// Number of option fields following `config_size`.
            pub const FIELD_COUNT: usize = [$($define),+].len();

            /// The statically compiled default core.
            pub const DEFAULT: Self = Self {
                config_size: std::mem::size_of::<Self>() as c_ulong,
                $($field: $default,)+
            };

            /// `(define name, value)` pairs in layout order.
            pub fn entries(&self) -> impl Iterator<Item = (&'static str, u32)> {
                [$(($define, self.$field)),+].into_iter()
            }
        }
    };
}

xtensa_config_layout! {
    xchal_have_be => "XCHAL_HAVE_BE" = 1,
    xchal_have_density => "XCHAL_HAVE_DENSITY" = 1,
    xchal_have_const16 => "XCHAL_HAVE_CONST16" = 0,
    xchal_have_abs => "XCHAL_HAVE_ABS" = 1,
    xchal_have_addx => "XCHAL_HAVE_ADDX" = 1,
    xchal_have_l32r => "XCHAL_HAVE_L32R" = 1,
    xshal_use_absolute_literals => "XSHAL_USE_ABSOLUTE_LITERALS" = 0,
    xshal_have_text_section_literals => "XSHAL_HAVE_TEXT_SECTION_LITERALS" = 1,
    xchal_have_mac16 => "XCHAL_HAVE_MAC16" = 0,
    xchal_have_mul16 => "XCHAL_HAVE_MUL16" = 1,
    xchal_have_mul32 => "XCHAL_HAVE_MUL32" = 1,
    xchal_have_mul32_high => "XCHAL_HAVE_MUL32_HIGH" = 0,
    xchal_have_div32 => "XCHAL_HAVE_DIV32" = 1,
    xchal_have_nsa => "XCHAL_HAVE_NSA" = 1,
    xchal_have_minmax => "XCHAL_HAVE_MINMAX" = 1,
    xchal_have_sext => "XCHAL_HAVE_SEXT" = 1,
    xchal_have_loops => "XCHAL_HAVE_LOOPS" = 1,
    xchal_have_threadptr => "XCHAL_HAVE_THREADPTR" = 1,
    xchal_have_release_sync => "XCHAL_HAVE_RELEASE_SYNC" = 0,
    xchal_have_s32c1i => "XCHAL_HAVE_S32C1I" = 1,
    xchal_have_booleans => "XCHAL_HAVE_BOOLEANS" = 0,
    xchal_have_fp => "XCHAL_HAVE_FP" = 0,
    xchal_have_fp_div => "XCHAL_HAVE_FP_DIV" = 0,
    xchal_have_fp_recip => "XCHAL_HAVE_FP_RECIP" = 0,
    xchal_have_fp_sqrt => "XCHAL_HAVE_FP_SQRT" = 0,
    xchal_have_fp_rsqrt => "XCHAL_HAVE_FP_RSQRT" = 0,
    xchal_have_fp_postinc => "XCHAL_HAVE_FP_POSTINC" = 0,
    xchal_have_dfp => "XCHAL_HAVE_DFP" = 0,
    xchal_have_dfp_div => "XCHAL_HAVE_DFP_DIV" = 0,
    xchal_have_dfp_recip => "XCHAL_HAVE_DFP_RECIP" = 0,
    xchal_have_dfp_sqrt => "XCHAL_HAVE_DFP_SQRT" = 0,
    xchal_have_dfp_rsqrt => "XCHAL_HAVE_DFP_RSQRT" = 0,
    xchal_have_windowed => "XCHAL_HAVE_WINDOWED" = 1,
    xchal_num_aregs => "XCHAL_NUM_AREGS" = 64,
    xchal_have_wide_branches => "XCHAL_HAVE_WIDE_BRANCHES" = 0,
    xchal_have_predicted_branches => "XCHAL_HAVE_PREDICTED_BRANCHES" = 0,
    xchal_icache_size => "XCHAL_ICACHE_SIZE" = 16384,
    xchal_dcache_size => "XCHAL_DCACHE_SIZE" = 16384,
    xchal_icache_linesize => "XCHAL_ICACHE_LINESIZE" = 32,
    xchal_dcache_linesize => "XCHAL_DCACHE_LINESIZE" = 32,
    xchal_icache_linewidth => "XCHAL_ICACHE_LINEWIDTH" = 5,
    xchal_dcache_linewidth => "XCHAL_DCACHE_LINEWIDTH" = 5,
    xchal_dcache_is_writeback => "XCHAL_DCACHE_IS_WRITEBACK" = 1,
    xchal_have_mmu => "XCHAL_HAVE_MMU" = 1,
    xchal_mmu_min_pte_page_size => "XCHAL_MMU_MIN_PTE_PAGE_SIZE" = 12,
    xchal_have_debug => "XCHAL_HAVE_DEBUG" = 1,
    xchal_num_ibreak => "XCHAL_NUM_IBREAK" = 2,
    xchal_num_dbreak => "XCHAL_NUM_DBREAK" = 2,
    xchal_debuglevel => "XCHAL_DEBUGLEVEL" = 6,
    xchal_max_instruction_size => "XCHAL_MAX_INSTRUCTION_SIZE" = 3,
    xchal_inst_fetch_width => "XCHAL_INST_FETCH_WIDTH" = 4,
    xshal_abi => "XSHAL_ABI" = 0,
    xthal_abi_windowed => "XTHAL_ABI_WINDOWED" = 0,
    xthal_abi_call0 => "XTHAL_ABI_CALL0" = 1,
}

/// The default blob handed out whenever no variant library is in play.
pub static DEFAULT_CONFIG: XtensaConfig = XtensaConfig::DEFAULT;

impl XtensaConfig {
    /// Size the consumer was compiled against.
    pub const EXPECTED_SIZE: usize = std::mem::size_of::<Self>();

    /// Whether the producer's declared size covers every field this build reads.
    pub fn is_compatible(&self) -> bool {
        usize::try_from(self.config_size).is_ok_and(|size| size >= Self::EXPECTED_SIZE)
    }

    /// Builtin define strings of the form `__XCHAL_HAVE_BE=1`.
    pub fn define_strings(&self) -> Vec<String> {
        self.entries()
            .map(|(name, value)| format!("__{name}={value}"))
            .collect()
    }
}

/// Rejects a blob whose producer declared fewer bytes than this build expects.
///
/// Only the leading `config_size` word is read, so a short blob is never
/// borrowed as a whole `XtensaConfig`.
///
/// # Safety
///
/// `ptr` must point to readable memory holding at least one `c_ulong`.
pub(crate) unsafe fn check_config_size(ptr: NonNull<XtensaConfig>) -> Result<(), LoadError> {
    let declared = ptr.cast::<c_ulong>().as_ptr().read();
    let found = u64::from(declared);
    match usize::try_from(declared) {
        Ok(size) if size >= XtensaConfig::EXPECTED_SIZE => Ok(()),
        _ => Err(LoadError::IncompatibleSize {
            found,
            expected: XtensaConfig::EXPECTED_SIZE,
        }),
    }
}

/// Shared borrow of data that lives until the process exits.
///
/// Values come either from a `static` in this crate or from a symbol inside a
/// shared library that is never unloaded. The wrapper has no destructor and
/// offers no way to reclaim the pointee: memory owned by a loaded module must
/// never be handed to an allocator.
pub struct ProcessLifetime<T: 'static> {
    ptr: NonNull<T>,
}

impl<T: 'static> ProcessLifetime<T> {
    /// Wraps data compiled into this binary.
    pub fn from_static(value: &'static T) -> Self {
        Self {
            ptr: NonNull::from(value),
        }
    }

    /// Wraps the address of a symbol resolved from a loaded library.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a valid, initialized `T` that stays mapped and is
    /// not mutated for the rest of the process.
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self { ptr }
    }

    /// The borrowed value, valid for the rest of the process.
    pub fn get(self) -> &'static T {
        // SAFETY: the constructors guarantee a process-lifetime, immutable pointee.
        unsafe { self.ptr.as_ref() }
    }

    pub fn as_ptr(self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Whether both borrows point at the same object.
    pub fn same_as(self, other: &T) -> bool {
        std::ptr::eq(self.as_ptr(), other)
    }
}

impl<T: 'static> Clone for ProcessLifetime<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for ProcessLifetime<T> {}

impl<T: 'static> Deref for ProcessLifetime<T> {
    type Target = T;

    fn deref(&self) -> &T {
        (*self).get()
    }
}

impl<T: 'static> fmt::Debug for ProcessLifetime<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProcessLifetime").field(&self.ptr).finish()
    }
}

// SAFETY: the pointee is immutable for the process lifetime, so sharing the
// pointer is as safe as sharing `&'static T`.
unsafe impl<T: Sync + 'static> Send for ProcessLifetime<T> {}
unsafe impl<T: Sync + 'static> Sync for ProcessLifetime<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct Truncated {
        config_size: c_ulong,
        xchal_have_be: c_uint,
    }

    static TRUNCATED: Truncated = Truncated {
        config_size: std::mem::size_of::<Truncated>() as c_ulong,
        xchal_have_be: 1,
    };

    #[test]
    fn test_default_declares_its_own_size() {
        assert_eq!(
            DEFAULT_CONFIG.config_size as usize,
            std::mem::size_of::<XtensaConfig>()
        );
        assert!(DEFAULT_CONFIG.is_compatible());
    }

    #[test]
    fn test_layout_has_all_fields() {
        assert_eq!(XtensaConfig::FIELD_COUNT, 54);
        assert_eq!(DEFAULT_CONFIG.entries().count(), XtensaConfig::FIELD_COUNT);
        assert_eq!(
            XtensaConfig::EXPECTED_SIZE,
            std::mem::size_of::<c_ulong>()
                + XtensaConfig::FIELD_COUNT * std::mem::size_of::<c_uint>()
                + padding_after_fields()
        );
    }

    fn padding_after_fields() -> usize {
        let raw = std::mem::size_of::<c_ulong>()
            + XtensaConfig::FIELD_COUNT * std::mem::size_of::<c_uint>();
        let align = std::mem::align_of::<XtensaConfig>();
        (align - raw % align) % align
    }

    #[test]
    fn test_entries_follow_layout_order() {
        let names: Vec<_> = DEFAULT_CONFIG.entries().map(|(name, _)| name).collect();
        assert_eq!(names.first(), Some(&"XCHAL_HAVE_BE"));
        assert_eq!(names.last(), Some(&"XTHAL_ABI_CALL0"));
        assert_eq!(names.get(33), Some(&"XCHAL_NUM_AREGS"));
    }

    #[test]
    fn test_define_strings_format() {
        let defines = DEFAULT_CONFIG.define_strings();
        assert!(defines.contains(&"__XCHAL_NUM_AREGS=64".to_string()));
        assert!(defines.contains(&"__XCHAL_HAVE_BE=1".to_string()));
        assert_eq!(defines.len(), XtensaConfig::FIELD_COUNT);
    }

    #[test]
    fn test_short_blob_rejected_without_full_read() {
        let ptr = NonNull::from(&TRUNCATED).cast::<XtensaConfig>();
        let result = unsafe { check_config_size(ptr) };

        match result {
            Err(LoadError::IncompatibleSize { found, expected }) => {
                assert_eq!(found as usize, std::mem::size_of::<Truncated>());
                assert_eq!(expected, XtensaConfig::EXPECTED_SIZE);
            }
            other => panic!("expected size rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_larger_blob_from_newer_producer_is_accepted() {
        #[repr(C)]
        struct Extended {
            base: XtensaConfig,
            xchal_future_option: c_uint,
        }
        static EXTENDED: Extended = Extended {
            base: XtensaConfig {
                config_size: std::mem::size_of::<Extended>() as c_ulong,
                ..XtensaConfig::DEFAULT
            },
            xchal_future_option: 7,
        };

        let ptr = NonNull::from(&EXTENDED.base);
        assert!(unsafe { check_config_size(ptr) }.is_ok());
        assert_eq!(EXTENDED.xchal_future_option, 7);
    }

    #[test]
    fn test_process_lifetime_preserves_identity() {
        let borrowed = ProcessLifetime::from_static(&DEFAULT_CONFIG);
        assert!(borrowed.same_as(&DEFAULT_CONFIG));
        assert!(std::ptr::eq(borrowed.get(), &DEFAULT_CONFIG));
        assert_eq!(borrowed.xchal_num_aregs, 64);
    }
}
