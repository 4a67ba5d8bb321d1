extern crate segmalloc;

use segmalloc::{MemArena, SegMalloc};

#[derive(Debug, Clone, Copy)]
struct Point {
    x: u64,
    y: u64,
}

#[inline(never)]
unsafe fn points(a: &mut SegMalloc) {
    let p1 = a.malloc(std::mem::size_of::<Point>()) as *mut Point;
    let p2 = a.malloc(std::mem::size_of::<Point>()) as *mut Point;
    p1.write(Point { x: 0, y: 0 });
    p2.write(Point { x: 1, y: 2 });
    println!("p1 = {:?} at {:?}", *p1, p1);
    println!("p2 = {:?} at {:?}", *p2, p2);

    a.free(p1 as *mut u8);
    let p3 = a.malloc(std::mem::size_of::<Point>()) as *mut Point;
    println!("p3 reuses p1: {}", p3 == p1);
    a.free(p2 as *mut u8);
    a.free(p3 as *mut u8);
}

#[inline(never)]
unsafe fn growing_buffer(a: &mut SegMalloc) {
    let mut len = 16;
    let mut buf = a.calloc(len, 1);
    for round in 0..8 {
        for i in 0..len {
            *buf.add(i) = round as u8;
        }
        len *= 2;
        buf = a.realloc(buf, len);
        println!(
            "round {}: buffer of {} bytes at {:?}, heap is {} bytes",
            round,
            len,
            buf,
            a.heap_size()
        );
    }
    a.free(buf);
}

fn main() {
    let mut a = SegMalloc::new();
    unsafe {
        points(&mut a);
        growing_buffer(&mut a);
    }
    println!("heap consistent: {}", a.check_heap(line!()));

    let mut small = SegMalloc::with_source(MemArena::with_capacity(8192));
    unsafe {
        let big = small.malloc(1 << 20);
        println!("1 MiB out of an 8 KiB arena: {:?}", big);
    }
}
