//! Static LDPC difficulty level table
//!
//! Each level fixes the code geometry `(n, wc, wr)`, the accepted Hamming
//! weight window and the probability that a random nonce decodes into that
//! window. Levels are ordered by non-increasing mining probability, which is
//! what the nearest-neighbour scan in [`search_level`] relies on.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

/// Baseline difficulty of the seoul code family (level 0)
pub const SEOUL_BASELINE_DIFFICULTY: u64 = 1023;

/// Per-level growth of seoul difficulty, as numerator / denominator (29/20 = 1.45)
const SEOUL_LEVEL_NUMERATOR: u32 = 29;
const SEOUL_LEVEL_DENOMINATOR: u32 = 20;

/// One row of the difficulty table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelEntry {
    /// Difficulty level
    pub level: usize,
    /// Code length (variable nodes)
    pub n: usize,
    /// Column weight (checks per variable)
    pub wc: usize,
    /// Row weight (variables per check)
    pub wr: usize,
    /// Smallest accepted codeword weight
    pub decision_from: usize,
    /// Largest accepted codeword weight
    pub decision_to: usize,
    /// Stride of accepted weights inside the window
    pub decision_step: usize,
    /// Probability that a random nonce is accepted at this level
    pub mining_prob: f64,
}

impl LevelEntry {
    /// Number of check nodes, `n * wc / wr`
    pub fn m(&self) -> usize {
        self.n * self.wc / self.wr
    }

    /// Whether `weight` falls into this level's acceptance window
    pub fn accepts_weight(&self, weight: usize) -> bool {
        weight >= self.decision_from
            && weight <= self.decision_to
            && (weight - self.decision_from) % self.decision_step.max(1) == 0
    }
}

const fn row(
    level: usize,
    n: usize,
    wc: usize,
    wr: usize,
    decision_from: usize,
    decision_to: usize,
    decision_step: usize,
    mining_prob: f64,
) -> LevelEntry {
    LevelEntry {
        level,
        n,
        wc,
        wr,
        decision_from,
        decision_to,
        decision_step,
        mining_prob,
    }
}

/// The default-network difficulty table, levels 0 through 380
pub static LEVEL_TABLE: [LevelEntry; 381] = [
    row(0, 32, 3, 4, 10, 22, 2, 3.077970e-05),
    row(1, 32, 3, 4, 10, 22, 2, 3.077970e-05),
    row(2, 32, 3, 4, 10, 16, 2, 2.023220e-05),
    row(3, 32, 3, 4, 16, 16, 1, 9.684650e-06),
    row(4, 32, 3, 4, 14, 14, 1, 6.784080e-06),
    row(5, 36, 3, 4, 12, 24, 2, 4.830240e-06),
    row(6, 36, 3, 4, 12, 18, 2, 3.125970e-06),
    row(7, 32, 3, 4, 12, 12, 1, 2.862890e-06),
    row(8, 44, 3, 4, 14, 30, 2, 1.637790e-06),
    row(9, 36, 3, 4, 18, 18, 1, 1.421700e-06),
    row(10, 36, 3, 4, 16, 16, 1, 1.051350e-06),
    row(11, 44, 3, 4, 14, 22, 2, 1.029740e-06),
    row(12, 40, 3, 4, 12, 28, 2, 7.570880e-07),
    row(13, 36, 3, 4, 14, 14, 1, 4.865630e-07),
    row(14, 40, 3, 4, 12, 20, 2, 4.813320e-07),
    row(15, 44, 3, 4, 22, 22, 1, 4.216920e-07),
    row(16, 44, 3, 4, 20, 20, 1, 3.350070e-07),
    row(17, 48, 3, 4, 14, 34, 2, 2.677070e-07),
    row(18, 40, 3, 4, 20, 20, 1, 2.055750e-07),
    row(19, 44, 3, 4, 18, 18, 1, 1.788400e-07),
    row(20, 48, 3, 4, 14, 24, 2, 1.664080e-07),
    row(21, 40, 3, 4, 18, 18, 1, 1.583110e-07),
    row(22, 40, 3, 4, 16, 16, 1, 7.917230e-08),
    row(23, 44, 3, 4, 16, 16, 1, 7.103820e-08),
    row(24, 48, 3, 4, 24, 24, 1, 6.510890e-08),
    row(25, 48, 3, 4, 22, 22, 1, 5.300760e-08),
    row(26, 52, 3, 4, 14, 40, 2, 4.266600e-08),
    row(27, 48, 3, 4, 20, 20, 1, 2.990510e-08),
    row(28, 40, 3, 4, 14, 14, 1, 2.927380e-08),
    row(29, 52, 3, 4, 14, 26, 2, 2.626790e-08),
    row(30, 60, 3, 4, 18, 42, 2, 1.485240e-08),
    row(31, 48, 3, 4, 18, 18, 1, 1.267290e-08),
    row(32, 52, 3, 4, 26, 26, 1, 9.891110e-09),
    row(33, 60, 3, 4, 18, 30, 2, 9.019200e-09),
    row(34, 48, 3, 4, 16, 32, 1, 8.762650e-09),
    row(35, 52, 3, 4, 24, 24, 1, 8.213140e-09),
    row(36, 56, 3, 4, 16, 42, 2, 6.658250e-09),
    row(37, 52, 3, 4, 22, 22, 1, 4.856960e-09),
    row(38, 48, 3, 4, 16, 16, 1, 4.381330e-09),
    row(39, 56, 3, 4, 16, 28, 2, 4.068000e-09),
    row(40, 60, 3, 4, 30, 30, 1, 3.186040e-09),
    row(41, 60, 3, 4, 28, 28, 1, 2.725470e-09),
    row(42, 64, 3, 4, 18, 46, 2, 2.410890e-09),
    row(43, 52, 3, 4, 20, 20, 1, 2.181360e-09),
    row(44, 60, 3, 4, 26, 26, 1, 1.737940e-09),
    row(45, 52, 3, 4, 18, 34, 1, 1.595330e-09),
    row(46, 56, 3, 4, 28, 28, 1, 1.481830e-09),
    row(47, 64, 3, 4, 18, 32, 2, 1.454780e-09),
    row(48, 56, 3, 4, 26, 26, 1, 1.250550e-09),
    row(49, 60, 3, 4, 24, 24, 1, 8.614860e-10),
    row(50, 52, 3, 4, 18, 18, 1, 7.976650e-10),
    row(51, 56, 3, 4, 24, 24, 1, 7.700380e-10),
    row(52, 60, 3, 4, 22, 38, 1, 6.978800e-10),
    row(53, 52, 3, 4, 16, 36, 1, 5.069080e-10),
    row(54, 64, 3, 4, 32, 32, 1, 4.986660e-10),
    row(55, 64, 3, 4, 30, 30, 1, 4.315180e-10),
    row(56, 68, 3, 4, 18, 50, 2, 3.848530e-10),
    row(57, 56, 3, 4, 22, 22, 1, 3.643130e-10),
    row(58, 60, 3, 4, 22, 22, 1, 3.489400e-10),
    row(59, 64, 3, 4, 28, 28, 1, 2.836780e-10),
    row(60, 56, 3, 4, 20, 36, 1, 2.809120e-10),
    row(61, 52, 3, 4, 16, 16, 1, 2.534540e-10),
    row(62, 60, 3, 4, 20, 40, 1, 2.427110e-10),
    row(63, 68, 3, 4, 18, 34, 2, 2.309280e-10),
    row(64, 64, 3, 4, 26, 26, 1, 1.466250e-10),
    row(65, 56, 3, 4, 20, 20, 1, 1.404560e-10),
    row(66, 76, 3, 4, 22, 54, 2, 1.375500e-10),
    row(67, 60, 3, 4, 20, 20, 1, 1.213550e-10),
    row(68, 56, 3, 4, 18, 38, 1, 9.340240e-11),
    row(69, 76, 3, 4, 22, 38, 2, 8.174200e-11),
    row(70, 68, 3, 4, 34, 34, 1, 7.700290e-11),
    row(71, 68, 3, 4, 32, 32, 1, 6.729690e-11),
    row(72, 64, 3, 4, 24, 24, 1, 6.217280e-11),
    row(73, 72, 3, 4, 18, 56, 2, 6.056200e-11),
    row(74, 56, 3, 4, 18, 18, 1, 4.670120e-11),
    row(75, 68, 3, 4, 30, 30, 1, 4.543980e-11),
    row(76, 64, 3, 4, 22, 42, 1, 4.517330e-11),
    row(77, 72, 3, 4, 18, 36, 2, 3.615450e-11),
    row(78, 76, 3, 4, 38, 38, 1, 2.593400e-11),
    row(79, 68, 3, 4, 28, 28, 1, 2.438720e-11),
    row(80, 76, 3, 4, 36, 36, 1, 2.303460e-11),
    row(81, 64, 3, 4, 22, 22, 1, 2.258660e-11),
    row(82, 80, 3, 4, 22, 58, 2, 2.229400e-11),
    row(83, 76, 3, 4, 34, 34, 1, 1.626350e-11),
    row(84, 64, 3, 4, 20, 40, 1, 1.465310e-11),
    row(85, 80, 3, 4, 22, 40, 2, 1.319160e-11),
    row(86, 72, 3, 4, 36, 36, 1, 1.174900e-11),
    row(87, 68, 3, 4, 26, 26, 1, 1.078820e-11),
    row(88, 72, 3, 4, 34, 34, 1, 1.035690e-11),
    row(89, 76, 3, 4, 32, 32, 1, 9.311370e-12),
    row(90, 68, 3, 4, 24, 44, 1, 8.173020e-12),
    row(91, 64, 3, 4, 20, 20, 1, 7.326570e-12),
    row(92, 72, 3, 4, 32, 32, 1, 7.160350e-12),
    row(93, 76, 3, 4, 30, 30, 1, 4.440960e-12),
    row(94, 80, 3, 4, 40, 40, 1, 4.089220e-12),
    row(95, 68, 3, 4, 24, 24, 1, 4.086510e-12),
    row(96, 72, 3, 4, 30, 30, 1, 3.975570e-12),
    row(97, 80, 3, 4, 38, 38, 1, 3.656430e-12),
    row(98, 76, 3, 4, 28, 48, 1, 3.634830e-12),
    row(99, 84, 3, 4, 22, 62, 2, 3.566880e-12),
    row(100, 68, 3, 4, 22, 46, 1, 2.750600e-12),
    row(101, 80, 3, 4, 36, 36, 1, 2.630600e-12),
    row(102, 84, 3, 4, 22, 42, 2, 2.102180e-12),
    row(103, 72, 3, 4, 28, 28, 1, 1.828850e-12),
    row(104, 76, 3, 4, 28, 28, 1, 1.817420e-12),
    row(105, 80, 3, 4, 34, 34, 1, 1.548670e-12),
    row(106, 72, 3, 4, 26, 46, 1, 1.441670e-12),
    row(107, 68, 3, 4, 22, 22, 1, 1.375300e-12),
    row(108, 76, 3, 4, 26, 50, 1, 1.314800e-12),
    row(109, 92, 3, 4, 24, 68, 2, 1.296220e-12),
    row(110, 68, 3, 4, 20, 48, 1, 8.516070e-13),
    row(111, 80, 3, 4, 32, 32, 1, 7.636740e-13),
    row(112, 92, 3, 4, 24, 46, 2, 7.585130e-13),
    row(113, 72, 3, 4, 26, 26, 1, 7.208340e-13),
    row(114, 76, 3, 4, 26, 26, 1, 6.573980e-13),
    row(115, 80, 3, 4, 30, 50, 1, 6.475910e-13),
    row(116, 84, 3, 4, 42, 42, 1, 6.374900e-13),
    row(117, 84, 3, 4, 40, 40, 1, 5.734350e-13),
    row(118, 88, 3, 4, 22, 66, 2, 5.640630e-13),
    row(119, 72, 3, 4, 24, 48, 1, 5.032200e-13),
    row(120, 76, 3, 4, 24, 52, 1, 4.325430e-13),
    row(121, 68, 3, 4, 20, 20, 1, 4.258030e-13),
    row(122, 84, 3, 4, 38, 38, 1, 4.195890e-13),
    row(123, 88, 3, 4, 22, 44, 2, 3.312130e-13),
    row(124, 80, 3, 4, 30, 30, 1, 3.237950e-13),
    row(125, 84, 3, 4, 36, 36, 1, 2.533670e-13),
    row(126, 72, 3, 4, 24, 24, 1, 2.516100e-13),
    row(127, 80, 3, 4, 28, 52, 1, 2.424700e-13),
    row(128, 92, 3, 4, 46, 46, 1, 2.208090e-13),
    row(129, 76, 3, 4, 24, 24, 1, 2.162710e-13),
    row(130, 96, 3, 4, 26, 72, 2, 2.099840e-13),
    row(131, 92, 3, 4, 44, 44, 1, 2.006580e-13),
    row(132, 72, 3, 4, 22, 50, 1, 1.605310e-13),
    row(133, 92, 3, 4, 42, 42, 1, 1.511670e-13),
    row(134, 84, 3, 4, 34, 34, 1, 1.288510e-13),
    row(135, 96, 3, 4, 26, 48, 2, 1.224810e-13),
    row(136, 80, 3, 4, 28, 28, 1, 1.212350e-13),
    row(137, 88, 3, 4, 44, 44, 1, 9.836240e-14),
    row(138, 92, 3, 4, 40, 40, 1, 9.542830e-14),
    row(139, 88, 3, 4, 42, 42, 1, 8.895450e-14),
    row(140, 80, 3, 4, 26, 54, 1, 8.227740e-14),
    row(141, 72, 3, 4, 22, 22, 1, 8.026550e-14),
    row(142, 88, 3, 4, 40, 40, 1, 6.609120e-14),
    row(143, 84, 3, 4, 32, 32, 1, 5.648410e-14),
    row(144, 92, 3, 4, 38, 38, 1, 5.127400e-14),
    row(145, 72, 3, 4, 20, 52, 1, 4.822030e-14),
    row(146, 84, 3, 4, 30, 54, 1, 4.372420e-14),
    row(147, 80, 3, 4, 26, 26, 1, 4.113870e-14),
    row(148, 88, 3, 4, 38, 38, 1, 4.084490e-14),
    row(149, 96, 3, 4, 48, 48, 1, 3.497970e-14),
    row(150, 100, 3, 4, 26, 76, 2, 3.365420e-14),
    row(151, 96, 3, 4, 46, 46, 1, 3.192740e-14),
    row(152, 80, 3, 4, 24, 56, 1, 2.593890e-14),
    row(153, 96, 3, 4, 44, 44, 1, 2.435890e-14),
    row(154, 72, 3, 4, 20, 20, 1, 2.411020e-14),
    row(155, 92, 3, 4, 36, 36, 1, 2.388460e-14),
    row(156, 84, 3, 4, 30, 30, 1, 2.186210e-14),
    row(157, 88, 3, 4, 36, 36, 1, 2.137330e-14),
    row(158, 92, 3, 4, 34, 58, 1, 1.967320e-14),
    row(159, 100, 3, 4, 26, 50, 2, 1.957080e-14),
    row(160, 96, 3, 4, 42, 42, 1, 1.568040e-14),
    row(161, 84, 3, 4, 28, 56, 1, 1.529960e-14),
    row(162, 80, 3, 4, 24, 24, 1, 1.296950e-14),
    row(163, 108, 3, 4, 28, 82, 2, 1.237200e-14),
    row(164, 92, 3, 4, 34, 34, 1, 9.836600e-15),
    row(165, 88, 3, 4, 34, 34, 1, 9.667440e-15),
    row(166, 96, 3, 4, 40, 40, 1, 8.634600e-15),
    row(167, 88, 3, 4, 32, 56, 1, 7.725050e-15),
    row(168, 84, 3, 4, 28, 28, 1, 7.649800e-15),
    row(169, 92, 3, 4, 32, 60, 1, 7.305750e-15),
    row(170, 108, 3, 4, 28, 54, 2, 7.154920e-15),
    row(171, 100, 3, 4, 50, 50, 1, 5.487490e-15),
    row(172, 104, 3, 4, 26, 78, 2, 5.340690e-15),
    row(173, 100, 3, 4, 48, 48, 1, 5.028760e-15),
    row(174, 84, 3, 4, 26, 58, 1, 4.951260e-15),
    row(175, 96, 3, 4, 38, 38, 1, 4.134930e-15),
    row(176, 100, 3, 4, 46, 46, 1, 3.881360e-15),
    row(177, 88, 3, 4, 32, 32, 1, 3.862530e-15),
    row(178, 92, 3, 4, 32, 32, 1, 3.652870e-15),
    row(179, 96, 3, 4, 36, 60, 1, 3.505650e-15),
    row(180, 104, 3, 4, 26, 52, 2, 3.096920e-15),
    row(181, 88, 3, 4, 30, 58, 1, 2.785770e-15),
    row(182, 100, 3, 4, 44, 44, 1, 2.543880e-15),
    row(183, 92, 3, 4, 30, 62, 1, 2.493880e-15),
    row(184, 84, 3, 4, 26, 26, 1, 2.475630e-15),
    row(185, 112, 3, 4, 28, 86, 2, 2.003890e-15),
    row(186, 108, 3, 4, 54, 54, 1, 1.937830e-15),
    row(187, 108, 3, 4, 52, 52, 1, 1.788370e-15),
    row(188, 96, 3, 4, 36, 36, 1, 1.752820e-15),
    row(189, 84, 3, 4, 24, 60, 1, 1.514630e-15),
    row(190, 100, 3, 4, 42, 42, 1, 1.433180e-15),
    row(191, 108, 3, 4, 50, 50, 1, 1.408830e-15),
    row(192, 88, 3, 4, 30, 30, 1, 1.392880e-15),
    row(193, 96, 3, 4, 34, 62, 1, 1.339400e-15),
    row(194, 92, 3, 4, 30, 30, 1, 1.246940e-15),
    row(195, 112, 3, 4, 28, 56, 2, 1.155930e-15),
    row(196, 108, 3, 4, 48, 48, 1, 9.534230e-16),
    row(197, 88, 3, 4, 28, 60, 1, 9.258750e-16),
    row(198, 104, 3, 4, 52, 52, 1, 8.531480e-16),
    row(199, 92, 3, 4, 28, 64, 1, 7.972240e-16),
    row(200, 104, 3, 4, 50, 50, 1, 7.847010e-16),
    row(201, 84, 3, 4, 24, 24, 1, 7.573130e-16),
    row(202, 100, 3, 4, 40, 40, 1, 7.043820e-16),
    row(203, 96, 3, 4, 34, 34, 1, 6.696990e-16),
    row(204, 100, 3, 4, 38, 62, 1, 6.138180e-16),
    row(205, 104, 3, 4, 48, 48, 1, 6.121340e-16),
    row(206, 108, 3, 4, 46, 46, 1, 5.596910e-16),
    row(207, 96, 3, 4, 32, 64, 1, 4.694950e-16),
    row(208, 88, 3, 4, 28, 28, 1, 4.629380e-16),
    row(209, 104, 3, 4, 46, 46, 1, 4.079260e-16),
    row(210, 92, 3, 4, 28, 28, 1, 3.986120e-16),
    row(211, 116, 3, 4, 30, 86, 2, 3.215820e-16),
    row(212, 112, 3, 4, 56, 56, 1, 3.079780e-16),
    row(213, 100, 3, 4, 38, 38, 1, 3.069090e-16),
    row(214, 88, 3, 4, 26, 62, 1, 2.893730e-16),
    row(215, 108, 3, 4, 44, 44, 1, 2.884350e-16),
    row(216, 112, 3, 4, 54, 54, 1, 2.851100e-16),
    row(217, 92, 3, 4, 26, 66, 1, 2.429760e-16),
    row(218, 100, 3, 4, 36, 64, 1, 2.410500e-16),
    row(219, 104, 3, 4, 44, 44, 1, 2.347600e-16),
    row(220, 96, 3, 4, 32, 32, 1, 2.347480e-16),
    row(221, 112, 3, 4, 52, 52, 1, 2.266460e-16),
    row(222, 116, 3, 4, 30, 58, 2, 1.850560e-16),
    row(223, 112, 3, 4, 50, 50, 1, 1.555940e-16),
    row(224, 96, 3, 4, 30, 66, 1, 1.536060e-16),
    row(225, 88, 3, 4, 26, 26, 1, 1.446860e-16),
    row(226, 108, 3, 4, 42, 42, 1, 1.322410e-16),
    row(227, 92, 3, 4, 26, 26, 1, 1.214880e-16),
    row(228, 100, 3, 4, 36, 36, 1, 1.205250e-16),
    row(229, 124, 3, 4, 32, 94, 2, 1.192380e-16),
    row(230, 104, 3, 4, 42, 42, 1, 1.182330e-16),
    row(231, 108, 3, 4, 40, 68, 1, 1.093900e-16),
    row(232, 112, 3, 4, 48, 48, 1, 9.304980e-17),
    row(233, 100, 3, 4, 34, 66, 1, 8.672750e-17),
    row(234, 88, 3, 4, 24, 64, 1, 8.671340e-17),
    row(235, 96, 3, 4, 30, 30, 1, 7.680300e-17),
    row(236, 124, 3, 4, 32, 62, 2, 6.831000e-17),
    row(237, 108, 3, 4, 40, 40, 1, 5.469510e-17),
    row(238, 104, 3, 4, 40, 40, 1, 5.287900e-17),
    row(239, 120, 3, 4, 30, 90, 2, 5.116510e-17),
    row(240, 112, 3, 4, 46, 46, 1, 4.900210e-17),
    row(241, 116, 3, 4, 58, 58, 1, 4.853020e-17),
    row(242, 96, 3, 4, 28, 68, 1, 4.769400e-17),
    row(243, 116, 3, 4, 56, 56, 1, 4.505610e-17),
    row(244, 100, 3, 4, 34, 34, 1, 4.336370e-17),
    row(245, 88, 3, 4, 24, 24, 1, 4.335670e-17),
    row(246, 104, 3, 4, 38, 66, 1, 4.264440e-17),
    row(247, 108, 3, 4, 38, 70, 1, 4.139190e-17),
    row(248, 116, 3, 4, 54, 54, 1, 3.611940e-17),
    row(249, 120, 3, 4, 30, 60, 2, 2.937590e-17),
    row(250, 100, 3, 4, 32, 68, 1, 2.904870e-17),
    row(251, 116, 3, 4, 52, 52, 1, 2.512890e-17),
    row(252, 96, 3, 4, 28, 28, 1, 2.384700e-17),
    row(253, 112, 3, 4, 44, 44, 1, 2.300220e-17),
    row(254, 104, 3, 4, 38, 38, 1, 2.132220e-17),
    row(255, 108, 3, 4, 38, 38, 1, 2.069600e-17),
    row(256, 112, 3, 4, 42, 70, 1, 1.949710e-17),
    row(257, 128, 3, 4, 32, 98, 2, 1.931040e-17),
    row(258, 124, 3, 4, 62, 62, 1, 1.738220e-17),
    row(259, 124, 3, 4, 60, 60, 1, 1.622110e-17),
    row(260, 104, 3, 4, 36, 68, 1, 1.573970e-17),
    row(261, 116, 3, 4, 50, 50, 1, 1.529120e-17),
    row(262, 108, 3, 4, 36, 72, 1, 1.452810e-17),
    row(263, 100, 3, 4, 32, 32, 1, 1.452430e-17),
    row(264, 124, 3, 4, 58, 58, 1, 1.320160e-17),
    row(265, 128, 3, 4, 32, 64, 2, 1.103980e-17),
    row(266, 112, 3, 4, 42, 42, 1, 9.748530e-18),
    row(267, 124, 3, 4, 56, 56, 1, 9.408340e-18),
    row(268, 100, 3, 4, 30, 70, 1, 9.198900e-18),
    row(269, 116, 3, 4, 48, 48, 1, 8.218710e-18),
    row(270, 104, 3, 4, 36, 36, 1, 7.869870e-18),
    row(271, 120, 3, 4, 60, 60, 1, 7.586620e-18),
    row(272, 112, 3, 4, 40, 72, 1, 7.557840e-18),
    row(273, 108, 3, 4, 36, 36, 1, 7.264050e-18),
    row(274, 120, 3, 4, 58, 58, 1, 7.062330e-18),
    row(275, 124, 3, 4, 54, 54, 1, 5.908890e-18),
    row(276, 120, 3, 4, 56, 56, 1, 5.705970e-18),
    row(277, 104, 3, 4, 34, 70, 1, 5.397190e-18),
    row(278, 108, 3, 4, 34, 74, 1, 4.794130e-18),
    row(279, 100, 3, 4, 30, 30, 1, 4.599450e-18),
    row(280, 120, 3, 4, 54, 54, 1, 4.019430e-18),
    row(281, 116, 3, 4, 46, 46, 1, 3.945320e-18),
    row(282, 112, 3, 4, 40, 40, 1, 3.778920e-18),
    row(283, 116, 3, 4, 44, 72, 1, 3.423190e-18),
    row(284, 124, 3, 4, 52, 52, 1, 3.297090e-18),
    row(285, 100, 3, 4, 28, 72, 1, 2.795780e-18),
    row(286, 128, 3, 4, 64, 64, 1, 2.769110e-18),
    row(287, 112, 3, 4, 38, 74, 1, 2.714430e-18),
    row(288, 104, 3, 4, 34, 34, 1, 2.698600e-18),
    row(289, 128, 3, 4, 62, 62, 1, 2.590140e-18),
    row(290, 120, 3, 4, 52, 52, 1, 2.486040e-18),
    row(291, 108, 3, 4, 34, 34, 1, 2.397060e-18),
    row(292, 128, 3, 4, 60, 60, 1, 2.122380e-18),
    row(293, 104, 3, 4, 32, 72, 1, 1.744360e-18),
    row(294, 116, 3, 4, 44, 44, 1, 1.711600e-18),
    row(295, 124, 3, 4, 50, 50, 1, 1.649820e-18),
    row(296, 128, 3, 4, 58, 58, 1, 1.529130e-18),
    row(297, 108, 3, 4, 32, 76, 1, 1.506960e-18),
    row(298, 100, 3, 4, 28, 28, 1, 1.397890e-18),
    row(299, 120, 3, 4, 50, 50, 1, 1.362180e-18),
    row(300, 116, 3, 4, 42, 74, 1, 1.358390e-18),
    row(301, 112, 3, 4, 38, 38, 1, 1.357210e-18),
    row(302, 128, 3, 4, 56, 56, 1, 9.742990e-19),
    row(303, 112, 3, 4, 36, 76, 1, 9.147070e-19),
    row(304, 104, 3, 4, 32, 32, 1, 8.721800e-19),
    row(305, 108, 3, 4, 32, 32, 1, 7.534800e-19),
    row(306, 124, 3, 4, 48, 48, 1, 7.478050e-19),
    row(307, 116, 3, 4, 42, 42, 1, 6.791960e-19),
    row(308, 120, 3, 4, 48, 48, 1, 6.679650e-19),
    row(309, 124, 3, 4, 46, 78, 1, 6.204930e-19),
    row(310, 120, 3, 4, 46, 74, 1, 5.926870e-19),
    row(311, 128, 3, 4, 54, 54, 1, 5.530780e-19),
    row(312, 104, 3, 4, 30, 74, 1, 5.388680e-19),
    row(313, 116, 3, 4, 40, 76, 1, 4.990110e-19),
    row(314, 112, 3, 4, 36, 36, 1, 4.573530e-19),
    row(315, 108, 3, 4, 30, 78, 1, 4.570100e-19),
    row(316, 124, 3, 4, 46, 46, 1, 3.102460e-19),
    row(317, 120, 3, 4, 46, 46, 1, 2.963440e-19),
    row(318, 112, 3, 4, 34, 78, 1, 2.927770e-19),
    row(319, 128, 3, 4, 52, 52, 1, 2.821290e-19),
    row(320, 104, 3, 4, 30, 30, 1, 2.694340e-19),
    row(321, 116, 3, 4, 40, 40, 1, 2.495060e-19),
    row(322, 120, 3, 4, 44, 76, 1, 2.405750e-19),
    row(323, 124, 3, 4, 44, 80, 1, 2.381080e-19),
    row(324, 108, 3, 4, 30, 30, 1, 2.285050e-19),
    row(325, 116, 3, 4, 38, 78, 1, 1.717170e-19),
    row(326, 104, 3, 4, 28, 76, 1, 1.613020e-19),
    row(327, 112, 3, 4, 34, 34, 1, 1.463890e-19),
    row(328, 128, 3, 4, 50, 50, 1, 1.305320e-19),
    row(329, 120, 3, 4, 44, 44, 1, 1.202870e-19),
    row(330, 124, 3, 4, 44, 44, 1, 1.190540e-19),
    row(331, 128, 3, 4, 48, 80, 1, 1.106170e-19),
    row(332, 120, 3, 4, 42, 78, 1, 9.035000e-20),
    row(333, 112, 3, 4, 32, 80, 1, 9.008150e-20),
    row(334, 116, 3, 4, 38, 38, 1, 8.585840e-20),
    row(335, 124, 3, 4, 42, 82, 1, 8.539640e-20),
    row(336, 104, 3, 4, 28, 28, 1, 8.065090e-20),
    row(337, 116, 3, 4, 36, 80, 1, 5.599310e-20),
    row(338, 128, 3, 4, 48, 48, 1, 5.530870e-20),
    row(339, 120, 3, 4, 42, 42, 1, 4.517500e-20),
    row(340, 112, 3, 4, 32, 32, 1, 4.504080e-20),
    row(341, 128, 3, 4, 46, 82, 1, 4.334810e-20),
    row(342, 124, 3, 4, 42, 42, 1, 4.269820e-20),
    row(343, 120, 3, 4, 40, 80, 1, 3.174430e-20),
    row(344, 124, 3, 4, 40, 84, 1, 2.891760e-20),
    row(345, 116, 3, 4, 36, 36, 1, 2.799660e-20),
    row(346, 112, 3, 4, 30, 82, 1, 2.695640e-20),
    row(347, 128, 3, 4, 46, 46, 1, 2.167410e-20),
    row(348, 116, 3, 4, 34, 82, 1, 1.749650e-20),
    row(349, 120, 3, 4, 40, 40, 1, 1.587220e-20),
    row(350, 128, 3, 4, 44, 84, 1, 1.586440e-20),
    row(351, 124, 3, 4, 40, 40, 1, 1.445880e-20),
    row(352, 112, 3, 4, 30, 30, 1, 1.347820e-20),
    row(353, 120, 3, 4, 38, 82, 1, 1.054790e-20),
    row(354, 124, 3, 4, 38, 86, 1, 9.338320e-21),
    row(355, 116, 3, 4, 34, 34, 1, 8.748240e-21),
    row(356, 128, 3, 4, 44, 44, 1, 7.932220e-21),
    row(357, 128, 3, 4, 42, 86, 1, 5.474680e-21),
    row(358, 116, 3, 4, 32, 84, 1, 5.297010e-21),
    row(359, 120, 3, 4, 38, 38, 1, 5.273960e-21),
    row(360, 124, 3, 4, 38, 38, 1, 4.669160e-21),
    row(361, 120, 3, 4, 36, 84, 1, 3.349800e-21),
    row(362, 124, 3, 4, 36, 88, 1, 2.903950e-21),
    row(363, 128, 3, 4, 42, 42, 1, 2.737340e-21),
    row(364, 116, 3, 4, 32, 32, 1, 2.648510e-21),
    row(365, 128, 3, 4, 40, 88, 1, 1.798290e-21),
    row(366, 120, 3, 4, 36, 36, 1, 1.674900e-21),
    row(367, 124, 3, 4, 36, 36, 1, 1.451970e-21),
    row(368, 120, 3, 4, 34, 86, 1, 1.027330e-21),
    row(369, 128, 3, 4, 40, 40, 1, 8.991430e-22),
    row(370, 124, 3, 4, 34, 90, 1, 8.779540e-22),
    row(371, 128, 3, 4, 38, 90, 1, 5.674390e-22),
    row(372, 120, 3, 4, 34, 34, 1, 5.136640e-22),
    row(373, 124, 3, 4, 34, 34, 1, 4.389770e-22),
    row(374, 120, 3, 4, 32, 88, 1, 3.073590e-22),
    row(375, 128, 3, 4, 38, 38, 1, 2.837200e-22),
    row(376, 128, 3, 4, 36, 92, 1, 1.735640e-22),
    row(377, 120, 3, 4, 32, 32, 1, 1.536800e-22),
    row(378, 128, 3, 4, 36, 36, 1, 8.678180e-23),
    row(379, 128, 3, 4, 34, 94, 1, 5.192020e-23),
    row(380, 128, 3, 4, 34, 34, 1, 2.600000e-23),
];

/// Look up a level, falling back to level 0 when out of range
pub fn lookup(level: usize) -> &'static LevelEntry {
    LEVEL_TABLE.get(level).unwrap_or(&LEVEL_TABLE[0])
}

/// Build the formula entry used by the seoul code family
pub fn seoul_entry(level: usize) -> LevelEntry {
    let n = 64 + level * 4;
    LevelEntry {
        level,
        n,
        wc: 3,
        wr: 4,
        decision_from: n / 4,
        decision_to: n * 3 / 4,
        decision_step: 1,
        mining_prob: 0.0,
    }
}

/// Convert a mining probability into the equivalent difficulty, `floor(1/p)`
pub fn probability_to_difficulty(probability: f64) -> u64 {
    if probability <= 0.0 {
        return u64::MAX;
    }
    (1.0 / probability).floor() as u64
}

/// Convert a difficulty into a mining probability, `1/d`
///
/// Zero is treated as the easiest possible difficulty.
pub fn difficulty_to_probability(difficulty: &BigUint) -> f64 {
    if difficulty.is_zero() {
        return 1.0;
    }
    match difficulty.to_f64() {
        Some(d) if d.is_finite() => 1.0 / d,
        _ => 0.0,
    }
}

/// Minimum default-network difficulty, derived from level 0
pub fn minimum_difficulty() -> u64 {
    probability_to_difficulty(LEVEL_TABLE[0].mining_prob)
}

/// Find the level whose mining probability is nearest to `1/difficulty`
///
/// The scan stops at the first level whose distance grows relative to the
/// previous one. On equal distances the first level encountered wins.
pub fn search_level(difficulty: &BigUint) -> usize {
    let probability = difficulty_to_probability(difficulty);

    let mut best_level = 0;
    let mut best_distance = f64::INFINITY;
    let mut previous_distance = f64::INFINITY;

    for entry in LEVEL_TABLE.iter() {
        let distance = (probability - entry.mining_prob).abs();
        if distance > previous_distance {
            break;
        }
        if distance < best_distance {
            best_distance = distance;
            best_level = entry.level;
        }
        previous_distance = distance;
    }

    best_level
}

/// Seoul level search: count how many 29/20 steps `difficulty` sits above the baseline
pub fn search_level_seoul(difficulty: &BigUint) -> usize {
    let threshold = BigUint::from(SEOUL_BASELINE_DIFFICULTY) * SEOUL_LEVEL_NUMERATOR;
    let mut ratio = difficulty * SEOUL_LEVEL_DENOMINATOR;
    let mut level = 0;

    while ratio >= threshold {
        ratio = ratio * SEOUL_LEVEL_DENOMINATOR / SEOUL_LEVEL_NUMERATOR;
        level += 1;
    }

    level
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_table_geometry_is_integral() {
        for entry in LEVEL_TABLE.iter() {
            assert_eq!(entry.n * entry.wc % entry.wr, 0, "level {}", entry.level);
            assert!(entry.decision_from <= entry.decision_to);
            assert!(entry.decision_to <= entry.n);
        }
    }

    #[test]
    fn test_table_levels_are_sequential() {
        for (index, entry) in LEVEL_TABLE.iter().enumerate() {
            assert_eq!(entry.level, index);
        }
    }

    #[test]
    fn test_table_probability_is_non_increasing() {
        for pair in LEVEL_TABLE.windows(2) {
            assert!(pair[1].mining_prob <= pair[0].mining_prob);
        }
    }

    #[test]
    fn test_lookup_falls_back_to_level_zero() {
        assert_eq!(lookup(5).level, 5);
        assert_eq!(lookup(10_000), &LEVEL_TABLE[0]);
    }

    #[test]
    fn test_minimum_difficulty() {
        assert_eq!(minimum_difficulty(), 32488);
    }

    #[test]
    fn test_search_level_million() {
        let level = search_level(&BigUint::from(1_000_000u32));
        assert_eq!(level, 11);

        // nearest neighbour among all rows
        let p = 1e-6;
        let best = LEVEL_TABLE
            .iter()
            .map(|e| (p - e.mining_prob).abs())
            .fold(f64::INFINITY, f64::min);
        assert_eq!((p - LEVEL_TABLE[level].mining_prob).abs(), best);
    }

    #[test]
    fn test_search_level_prefers_first_on_tie() {
        // levels 0 and 1 share a probability
        assert_eq!(LEVEL_TABLE[0].mining_prob, LEVEL_TABLE[1].mining_prob);
        assert_eq!(search_level(&BigUint::from(1u32)), 0);
        assert_eq!(search_level(&BigUint::zero()), 0);
    }

    #[test]
    fn test_search_level_huge_difficulty() {
        let huge: BigUint = BigUint::from(1u32) << 400;
        let level = search_level(&huge);
        assert_eq!(level, LEVEL_TABLE.len() - 1);
    }

    #[test_case(0, 0 ; "zero")]
    #[test_case(1023, 0 ; "baseline")]
    #[test_case(1483, 0 ; "just below first step")]
    #[test_case(1484, 1 ; "first step")]
    #[test_case(2150, 1 ; "just below second step")]
    #[test_case(2151, 2 ; "second step")]
    fn test_search_level_seoul(difficulty: u64, expected: usize) {
        assert_eq!(search_level_seoul(&BigUint::from(difficulty)), expected);
    }

    #[test]
    fn test_search_level_seoul_beyond_u64() {
        let small = search_level_seoul(&BigUint::from(u64::MAX));
        let big = search_level_seoul(&(BigUint::from(u64::MAX) * 1000u32));
        assert!(big > small);
    }

    #[test]
    fn test_seoul_entry() {
        let entry = seoul_entry(3);
        assert_eq!(entry.n, 76);
        assert_eq!(entry.m(), 57);
        assert_eq!(entry.decision_from, 19);
        assert_eq!(entry.decision_to, 57);
        assert!(entry.accepts_weight(19));
        assert!(!entry.accepts_weight(58));
    }

    #[test]
    fn test_accepts_weight_respects_step() {
        let entry = LEVEL_TABLE[0];
        assert_eq!(entry.decision_step, 2);
        assert!(entry.accepts_weight(entry.decision_from));
        assert!(!entry.accepts_weight(entry.decision_from + 1));
        assert!(entry.accepts_weight(entry.decision_from + 2));
        assert!(!entry.accepts_weight(entry.decision_from - 1));
    }
}
