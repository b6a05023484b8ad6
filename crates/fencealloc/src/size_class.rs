/// Segregated free lists are indexed by size class. Classes 0..6 hold
/// payloads up to the listed bound; class 7 is the catch-all for everything
/// larger than 2048 bytes.
pub const NUM_SIZE_CLASSES: usize = 8;

/// Upper payload bound of each class below the catch-all.
pub const CLASS_BOUNDS: [usize; NUM_SIZE_CLASSES - 1] = [32, 64, 128, 256, 512, 1024, 2048];

/// Look up the size class index for a payload size: the lowest class whose
/// bound is >= `size`.
#[inline]
pub fn class_of(size: usize) -> usize {
    let mut class = 0;
    while class < CLASS_BOUNDS.len() {
        if size <= CLASS_BOUNDS[class] {
            return class;
        }
        class += 1;
    }
    NUM_SIZE_CLASSES - 1
}
