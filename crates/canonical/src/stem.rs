//! Porter stemmer.
//!
//! A direct implementation of M.F. Porter's 1980 suffix-stripping algorithm
//! over ASCII lowercase words. Words that are not pure ASCII, or that have
//! two characters or fewer, are returned unchanged.
//!
//! ```rust
//! use canonical::stem;
//!
//! assert_eq!(stem("caresses"), "caress");
//! assert_eq!(stem("motoring"), "motor");
//! ```

/// Reduce `word` to its Porter stem.
pub fn stem(word: &str) -> String {
    if word.len() <= 2 || !word.is_ascii() {
        return word.to_string();
    }

    let mut porter = Porter {
        b: word.as_bytes().to_vec(),
        j: 0,
    };
    porter.step1ab();
    if porter.k() > 0 {
        porter.step1c();
        porter.step2();
        porter.step3();
        porter.step4();
        porter.step5();
    }

    // Only ASCII bytes were ever written into the buffer.
    String::from_utf8(porter.b).unwrap_or_else(|_| word.to_string())
}

const STEP2_SUFFIXES: &[(&[u8], &[u8])] = &[
    (b"ational", b"ate"),
    (b"tional", b"tion"),
    (b"enci", b"ence"),
    (b"anci", b"ance"),
    (b"izer", b"ize"),
    (b"bli", b"ble"),
    (b"alli", b"al"),
    (b"entli", b"ent"),
    (b"eli", b"e"),
    (b"ousli", b"ous"),
    (b"ization", b"ize"),
    (b"ation", b"ate"),
    (b"ator", b"ate"),
    (b"alism", b"al"),
    (b"iveness", b"ive"),
    (b"fulness", b"ful"),
    (b"ousness", b"ous"),
    (b"aliti", b"al"),
    (b"iviti", b"ive"),
    (b"biliti", b"ble"),
    (b"logi", b"log"),
];

const STEP3_SUFFIXES: &[(&[u8], &[u8])] = &[
    (b"icate", b"ic"),
    (b"ative", b""),
    (b"alize", b"al"),
    (b"iciti", b"ic"),
    (b"ical", b"ic"),
    (b"ful", b""),
    (b"ness", b""),
];

const STEP4_SUFFIXES: &[&[u8]] = &[
    b"al", b"ance", b"ence", b"er", b"ic", b"able", b"ible", b"ant", b"ement", b"ment", b"ent",
    b"ion", b"ou", b"ism", b"ate", b"iti", b"ous", b"ive", b"ize",
];

/// Working buffer. The word under consideration is always the whole of `b`,
/// so `k()` is the index of its last byte; `j` marks the end of the stem
/// left by the most recent successful `ends` call (it may be -1).
struct Porter {
    b: Vec<u8>,
    j: isize,
}

impl Porter {
    fn k(&self) -> isize {
        self.b.len() as isize - 1
    }

    fn at(&self, i: isize) -> u8 {
        self.b[i as usize]
    }

    fn cons(&self, i: isize) -> bool {
        match self.at(i) {
            b'a' | b'e' | b'i' | b'o' | b'u' => false,
            b'y' => i == 0 || !self.cons(i - 1),
            _ => true,
        }
    }

    /// Number of vowel-consonant sequences in `b[0..=j]`.
    fn m(&self) -> usize {
        let mut n = 0;
        let mut i = 0;
        loop {
            if i > self.j {
                return n;
            }
            if !self.cons(i) {
                break;
            }
            i += 1;
        }
        i += 1;
        loop {
            loop {
                if i > self.j {
                    return n;
                }
                if self.cons(i) {
                    break;
                }
                i += 1;
            }
            i += 1;
            n += 1;
            loop {
                if i > self.j {
                    return n;
                }
                if !self.cons(i) {
                    break;
                }
                i += 1;
            }
            i += 1;
        }
    }

    fn vowel_in_stem(&self) -> bool {
        (0..=self.j).any(|i| !self.cons(i))
    }

    fn double_consonant(&self, i: isize) -> bool {
        i >= 1 && self.at(i) == self.at(i - 1) && self.cons(i)
    }

    /// consonant-vowel-consonant ending at `i`, where the last consonant is
    /// not w, x or y.
    fn cvc(&self, i: isize) -> bool {
        if i < 2 || !self.cons(i) || self.cons(i - 1) || !self.cons(i - 2) {
            return false;
        }
        !matches!(self.at(i), b'w' | b'x' | b'y')
    }

    fn ends(&mut self, suffix: &[u8]) -> bool {
        if !self.b.ends_with(suffix) {
            return false;
        }
        self.j = self.k() - suffix.len() as isize;
        true
    }

    fn set_to(&mut self, replacement: &[u8]) {
        self.b.truncate((self.j + 1) as usize);
        self.b.extend_from_slice(replacement);
    }

    fn replace_if_measured(&mut self, replacement: &[u8]) {
        if self.m() > 0 {
            self.set_to(replacement);
        }
    }

    fn pop(&mut self) {
        self.b.pop();
    }

    fn step1ab(&mut self) {
        if self.at(self.k()) == b's' {
            if self.ends(b"sses") {
                self.b.truncate(self.b.len() - 2);
            } else if self.ends(b"ies") {
                self.set_to(b"i");
            } else if self.at(self.k() - 1) != b's' {
                self.pop();
            }
        }

        if self.ends(b"eed") {
            if self.m() > 0 {
                self.pop();
            }
        } else if (self.ends(b"ed") || self.ends(b"ing")) && self.vowel_in_stem() {
            self.b.truncate((self.j + 1) as usize);
            if self.ends(b"at") {
                self.set_to(b"ate");
            } else if self.ends(b"bl") {
                self.set_to(b"ble");
            } else if self.ends(b"iz") {
                self.set_to(b"ize");
            } else if self.double_consonant(self.k()) {
                if !matches!(self.at(self.k()), b'l' | b's' | b'z') {
                    self.pop();
                }
            } else {
                self.j = self.k();
                if self.m() == 1 && self.cvc(self.k()) {
                    self.b.push(b'e');
                }
            }
        }
    }

    fn step1c(&mut self) {
        if self.ends(b"y") && self.vowel_in_stem() {
            let k = self.k() as usize;
            self.b[k] = b'i';
        }
    }

    fn step2(&mut self) {
        for (suffix, replacement) in STEP2_SUFFIXES {
            if self.ends(suffix) {
                self.replace_if_measured(replacement);
                return;
            }
        }
    }

    fn step3(&mut self) {
        for (suffix, replacement) in STEP3_SUFFIXES {
            if self.ends(suffix) {
                self.replace_if_measured(replacement);
                return;
            }
        }
    }

    fn step4(&mut self) {
        for suffix in STEP4_SUFFIXES {
            if !self.ends(suffix) {
                continue;
            }
            if *suffix == b"ion" && !(self.j >= 0 && matches!(self.at(self.j), b's' | b't')) {
                continue;
            }
            if self.m() > 1 {
                self.b.truncate((self.j + 1) as usize);
            }
            return;
        }
    }

    fn step5(&mut self) {
        self.j = self.k();
        if self.at(self.k()) == b'e' {
            let a = self.m();
            if a > 1 || (a == 1 && !self.cvc(self.k() - 1)) {
                self.pop();
            }
        }
        if self.at(self.k()) == b'l' && self.double_consonant(self.k()) && self.m() > 1 {
            self.pop();
        }
    }
}
